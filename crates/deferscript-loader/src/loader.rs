//! Script loader.
//!
//! The [`ScriptLoader`] keeps one entry per identity key. Requests for a key
//! that is already known share its entry; each request's trigger is attached
//! to it, and whichever resolves first performs the single insertion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use deferscript_config::{ErrorPolicy, LoaderConfig};
use deferscript_trigger::{RenderMode, ResolvedTrigger};
use tracing::{debug, info};

use crate::api::SharedApi;
use crate::document::{Document, GlobalScope};
use crate::entry::ScriptEntry;
use crate::handle::LoadHandle;
use crate::resource::ScriptResource;
use crate::status::LoadStatus;

/// Extracts the API object from the global namespace after load.
pub type UseFn = Arc<dyn Fn(&dyn GlobalScope) -> Option<SharedApi> + Send + Sync>;

/// A resource plus the function that extracts its API.
#[derive(Clone)]
pub struct LoadRequest {
  pub resource: ScriptResource,
  pub use_api: UseFn,
}

impl LoadRequest {
  pub fn new(
    resource: ScriptResource,
    use_api: impl Fn(&dyn GlobalScope) -> Option<SharedApi> + Send + Sync + 'static,
  ) -> Self {
    Self {
      resource,
      use_api: Arc::new(use_api),
    }
  }

  /// A request whose API is the global registered under `name`.
  pub fn global(resource: ScriptResource, name: impl Into<String>) -> Self {
    let name = name.into();
    Self::new(resource, move |globals| globals.get(&name))
  }
}

impl std::fmt::Debug for LoadRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoadRequest")
      .field("resource", &self.resource)
      .finish_non_exhaustive()
  }
}

/// Inserts scripts into a document, once per identity key.
pub struct ScriptLoader {
  document: Arc<dyn Document>,
  globals: Arc<dyn GlobalScope>,
  config: LoaderConfig,
  entries: Mutex<HashMap<String, Arc<ScriptEntry>>>,
  next_attempt: AtomicU64,
}

impl ScriptLoader {
  pub fn new(
    document: Arc<dyn Document>,
    globals: Arc<dyn GlobalScope>,
    config: LoaderConfig,
  ) -> Self {
    Self {
      document,
      globals,
      config,
      entries: Mutex::new(HashMap::new()),
      next_attempt: AtomicU64::new(1),
    }
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<ScriptEntry>>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn render_mode(&self) -> RenderMode {
    self.document.render_mode()
  }

  pub fn config(&self) -> &LoaderConfig {
    &self.config
  }

  /// Request a script.
  ///
  /// Returns a handle to the entry for the request's key, creating it if
  /// needed. The resource is inserted when `trigger` (or any other trigger
  /// attached to the same entry) resolves to proceed. Never fails: load
  /// errors surface through the handle.
  pub fn load(&self, request: LoadRequest, trigger: &ResolvedTrigger) -> LoadHandle {
    let key = request.resource.key.clone();

    let (entry, created) = {
      let mut entries = self.entries();
      match entries.get(&key).cloned() {
        Some(existing) if !self.should_retry(&existing) => (existing, false),
        previous => {
          if previous.is_some() {
            info!(key = %key, "retrying failed script");
          }
          let entry = Arc::new(ScriptEntry::new(
            self.next_attempt.fetch_add(1, Ordering::Relaxed),
            request.resource,
            request.use_api,
            self.document.clone(),
            self.globals.clone(),
          ));
          entries.insert(key.clone(), entry.clone());
          (entry, true)
        }
      }
    };

    if created {
      info!(
        key = %key,
        src = %entry.resource().src,
        trigger = trigger.kind(),
        "script requested"
      );
    } else {
      debug!(key = %key, status = %entry.status(), "reusing script entry");
    }

    if self.document.render_mode() == RenderMode::Server || trigger.is_deferred() {
      debug!(key = %key, "server render, insertion deferred");
      return LoadHandle::new(entry);
    }

    if !entry.status().is_terminal() {
      let weak = Arc::downgrade(&entry);
      trigger.gate().on_resolve(move |proceed| {
        let Some(entry) = weak.upgrade() else {
          return;
        };
        if proceed {
          entry.begin_insert();
        } else {
          debug!(key = %entry.key(), "trigger declined, script not inserted");
        }
      });
      entry.retain_trigger(trigger.gate());
    }

    LoadHandle::new(entry)
  }

  fn should_retry(&self, entry: &ScriptEntry) -> bool {
    self.config.on_error == ErrorPolicy::Retry && entry.status() == LoadStatus::Error
  }

  /// Remove a script from the document and forget its key.
  ///
  /// Handles to the removed entry keep their last state; one that had not
  /// finished loading fails with `Removed`. A later request inserts afresh.
  pub fn remove(&self, key: &str) -> bool {
    let entry = self.entries().remove(key);
    let Some(entry) = entry else {
      return false;
    };

    entry.detach();
    let removed = self.document.remove(key);
    info!(key = %key, removed_element = removed, "script removed");
    true
  }

  /// Handle to an existing entry.
  pub fn handle(&self, key: &str) -> Option<LoadHandle> {
    self.entries().get(key).cloned().map(LoadHandle::new)
  }

  pub fn status(&self, key: &str) -> Option<LoadStatus> {
    self.entries().get(key).map(|e| e.status())
  }

  /// Known keys and their status, sorted by key.
  pub fn snapshot(&self) -> Vec<(String, LoadStatus)> {
    let mut snapshot: Vec<_> = self
      .entries()
      .iter()
      .map(|(key, entry)| (key.clone(), entry.status()))
      .collect();
    snapshot.sort_by(|a, b| a.0.cmp(&b.0));
    snapshot
  }
}
