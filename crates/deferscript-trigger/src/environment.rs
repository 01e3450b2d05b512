use std::fmt;
use std::sync::Arc;

use deferscript_config::InteractionKind;

use crate::subscription::Subscription;

/// Where the runtime is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
  /// Server rendering: no document access, triggers are deferred.
  Server,
  /// Client execution with a live document.
  Client,
}

/// Reference to a target element (selector or id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
  pub fn new(selector: impl Into<String>) -> Self {
    Self(selector.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ElementRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ElementRef {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

/// Callback invoked by the environment each time an event fires.
pub type EventCallback = Arc<dyn Fn() + Send + Sync>;

/// Event wiring the trigger resolver depends on.
///
/// A browser binding implements this over the framework's ready hook,
/// `IntersectionObserver` and DOM listeners; tests implement it with a fake.
pub trait TriggerEnvironment: Send + Sync {
  fn render_mode(&self) -> RenderMode;

  /// Register for the host's ready/idle event.
  ///
  /// If the host is already ready the callback may run before this returns.
  fn on_ready(&self, callback: EventCallback) -> Subscription;

  /// Register for an interaction on an element.
  fn observe(
    &self,
    element: &ElementRef,
    kind: InteractionKind,
    callback: EventCallback,
  ) -> Subscription;

  /// Whether the interaction state is already satisfied, e.g. the server
  /// rendered the element visible or the pointer is already over it at
  /// hydration.
  fn is_satisfied(&self, _element: &ElementRef, _kind: InteractionKind) -> bool {
    false
  }
}
