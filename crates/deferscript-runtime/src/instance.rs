use deferscript_loader::{LoadFailure, LoadHandle, LoadStatus, SharedApi};
use deferscript_proxy::CallProxy;
use deferscript_trigger::{GatePhase, ResolvedTrigger};
use tokio::sync::watch;
use tracing::instrument;

use crate::runtime::ScriptRuntime;

/// One caller's use of a script.
///
/// Instances for the same key and attempt share the loader entry and the
/// call proxy; each keeps its own trigger.
#[derive(Clone)]
pub struct ScriptInstance {
  runtime: ScriptRuntime,
  handle: LoadHandle,
  trigger: ResolvedTrigger,
  proxy: CallProxy,
}

impl ScriptInstance {
  pub(crate) fn new(
    runtime: ScriptRuntime,
    handle: LoadHandle,
    trigger: ResolvedTrigger,
    proxy: CallProxy,
  ) -> Self {
    Self {
      runtime,
      handle,
      trigger,
      proxy,
    }
  }

  pub fn key(&self) -> &str {
    self.handle.key()
  }

  pub fn status(&self) -> LoadStatus {
    self.handle.status()
  }

  pub fn watch_status(&self) -> watch::Receiver<LoadStatus> {
    self.handle.watch()
  }

  /// Where this instance's own trigger stands.
  pub fn trigger_phase(&self) -> GatePhase {
    self.trigger.phase()
  }

  /// Resolve this instance's trigger now.
  ///
  /// Returns `false` if the trigger had already settled or the page is
  /// server rendered. Loading an already inserted script is a no-op.
  pub fn load(&self) -> bool {
    self.trigger.load()
  }

  pub fn on_loaded(&self, f: impl FnOnce(SharedApi) + Send + 'static) {
    self.handle.on_loaded(f);
  }

  pub fn on_error(&self, f: impl FnOnce(LoadFailure) + Send + 'static) {
    self.handle.on_error(f);
  }

  pub fn proxy(&self) -> &CallProxy {
    &self.proxy
  }

  pub fn handle(&self) -> &LoadHandle {
    &self.handle
  }

  /// Wait for the script to load or fail.
  #[instrument(name = "script_wait", skip(self), fields(key = %self.key()))]
  pub async fn wait(&self) -> Result<SharedApi, LoadFailure> {
    self.handle.wait().await
  }

  /// Remove the script from the document.
  ///
  /// Only removes the entry this instance belongs to; if the key was already
  /// removed and requested again, the newer entry is left alone.
  pub fn remove(&self) -> bool {
    self.runtime.remove_attempt(self.key(), self.handle.attempt())
  }
}

impl std::fmt::Debug for ScriptInstance {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ScriptInstance")
      .field("key", &self.key())
      .field("attempt", &self.handle.attempt())
      .field("status", &self.status())
      .field("trigger", &self.trigger.kind())
      .finish()
  }
}
