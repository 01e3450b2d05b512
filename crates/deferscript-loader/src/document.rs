use std::sync::Weak;

use deferscript_trigger::RenderMode;

use crate::api::SharedApi;
use crate::entry::ScriptEntry;
use crate::error::LoadFailure;
use crate::resource::ScriptElement;

/// The execution environment scripts are inserted into.
///
/// A browser binding appends a `<script>` element and wires its `load` and
/// `error` events to the [`LoadSignal`].
pub trait Document: Send + Sync {
  fn render_mode(&self) -> RenderMode;

  /// Attach the element. Report the outcome through `signal`, now or later.
  fn insert(&self, element: ScriptElement, signal: LoadSignal);

  /// Remove the element for `key`. Returns whether one was present.
  fn remove(&self, key: &str) -> bool;
}

/// The shared namespace scripts attach their API objects to.
pub trait GlobalScope: Send + Sync {
  fn get(&self, name: &str) -> Option<SharedApi>;
}

/// One-shot reporter for an inserted element's outcome.
///
/// Consuming `self` makes double reporting impossible.
pub struct LoadSignal {
  entry: Weak<ScriptEntry>,
  key: String,
}

impl LoadSignal {
  pub(crate) fn new(entry: Weak<ScriptEntry>, key: String) -> Self {
    Self { entry, key }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// The environment reported the load-completion event.
  pub fn loaded(self) {
    if let Some(entry) = self.entry.upgrade() {
      entry.complete(Ok(()));
    }
  }

  /// The environment reported a network or parse failure.
  pub fn failed(self, failure: LoadFailure) {
    if let Some(entry) = self.entry.upgrade() {
      entry.complete(Err(failure));
    }
  }
}

impl std::fmt::Debug for LoadSignal {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LoadSignal").field("key", &self.key).finish()
  }
}
