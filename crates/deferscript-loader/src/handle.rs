use std::sync::Arc;

use tokio::sync::watch;

use crate::api::SharedApi;
use crate::entry::ScriptEntry;
use crate::error::LoadFailure;
use crate::resource::ScriptResource;
use crate::status::LoadStatus;

/// A caller's view of a script entry.
///
/// Every handle for the same key and attempt observes the same single
/// insertion and the same transitions.
#[derive(Clone)]
pub struct LoadHandle {
  entry: Arc<ScriptEntry>,
}

impl LoadHandle {
  pub(crate) fn new(entry: Arc<ScriptEntry>) -> Self {
    Self { entry }
  }

  pub fn key(&self) -> &str {
    self.entry.key()
  }

  /// Attempt number. Changes only when a failed key is retried.
  pub fn attempt(&self) -> u64 {
    self.entry.attempt()
  }

  pub fn resource(&self) -> &ScriptResource {
    self.entry.resource()
  }

  pub fn status(&self) -> LoadStatus {
    self.entry.status()
  }

  /// Observe status changes.
  pub fn watch(&self) -> watch::Receiver<LoadStatus> {
    self.entry.watch()
  }

  /// The API object, once loaded.
  pub fn api(&self) -> Option<SharedApi> {
    self.entry.api()
  }

  pub fn failure(&self) -> Option<LoadFailure> {
    self.entry.failure()
  }

  /// Run `f` with the API object when the script loads.
  ///
  /// Fires at most once. If the script already loaded it fires now; if it
  /// already failed it never fires.
  pub fn on_loaded(&self, f: impl FnOnce(SharedApi) + Send + 'static) {
    self.entry.on_loaded(Box::new(f));
  }

  /// Run `f` with the failure when the script fails to load.
  ///
  /// Fires at most once, immediately if the script already failed.
  pub fn on_error(&self, f: impl FnOnce(LoadFailure) + Send + 'static) {
    self.entry.on_error(Box::new(f));
  }

  /// Wait for the terminal outcome.
  pub async fn wait(&self) -> Result<SharedApi, LoadFailure> {
    let mut rx = self.watch();
    // The sender lives in the entry this handle keeps alive.
    let _ = rx.wait_for(|status| status.is_terminal()).await;

    match (self.api(), self.failure()) {
      (Some(api), _) => Ok(api),
      (None, Some(failure)) => Err(failure),
      (None, None) => Err(LoadFailure::Removed {
        key: self.key().to_string(),
      }),
    }
  }

  /// Whether two handles share the same underlying entry.
  pub fn same_entry(&self, other: &LoadHandle) -> bool {
    Arc::ptr_eq(&self.entry, &other.entry)
  }
}

impl std::fmt::Debug for LoadHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoadHandle")
      .field("key", &self.key())
      .field("attempt", &self.attempt())
      .field("status", &self.status())
      .finish()
  }
}
