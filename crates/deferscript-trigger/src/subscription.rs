/// Handle to a registered listener.
///
/// Dropping the subscription unregisters the listener. Environments hand one
/// back from every `observe`/`on_ready` call.
#[must_use = "dropping a subscription unregisters the listener"]
pub struct Subscription {
  unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
  /// Create a subscription that runs `unsubscribe` when released.
  pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
    Self {
      unsubscribe: Some(Box::new(unsubscribe)),
    }
  }

  /// A subscription with nothing to release.
  pub fn noop() -> Self {
    Self { unsubscribe: None }
  }

  /// Release the listener now.
  pub fn unsubscribe(mut self) {
    if let Some(f) = self.unsubscribe.take() {
      f();
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(f) = self.unsubscribe.take() {
      f();
    }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.unsubscribe.is_some())
      .finish()
  }
}
