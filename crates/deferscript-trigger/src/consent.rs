//! Consent state shared by consent triggers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::subscription::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
  Undecided,
  Granted,
  Denied,
}

type DecisionListener = Box<dyn FnOnce(bool) + Send>;

struct ConsentInner {
  state: ConsentState,
  next_id: u64,
  listeners: Vec<(u64, DecisionListener)>,
}

/// Application-wide consent switch.
///
/// Typically wired to a cookie banner. The first decision is final for the
/// triggers waiting on it; a grant after a denial still releases triggers
/// registered later.
#[derive(Clone)]
pub struct ConsentHandle {
  inner: Arc<Mutex<ConsentInner>>,
}

impl ConsentHandle {
  pub fn new() -> Self {
    Self::with_state(ConsentState::Undecided)
  }

  /// Start from a decision restored elsewhere (e.g. a stored cookie).
  pub fn with_state(state: ConsentState) -> Self {
    Self {
      inner: Arc::new(Mutex::new(ConsentInner {
        state,
        next_id: 0,
        listeners: Vec::new(),
      })),
    }
  }

  fn lock(&self) -> MutexGuard<'_, ConsentInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn state(&self) -> ConsentState {
    self.lock().state
  }

  pub fn is_granted(&self) -> bool {
    self.state() == ConsentState::Granted
  }

  pub fn accept(&self) {
    self.decide(ConsentState::Granted);
  }

  pub fn deny(&self) {
    self.decide(ConsentState::Denied);
  }

  fn decide(&self, decision: ConsentState) {
    let listeners = {
      let mut inner = self.lock();
      inner.state = decision;
      std::mem::take(&mut inner.listeners)
    };

    let granted = decision == ConsentState::Granted;
    info!(granted, waiting = listeners.len(), "consent decided");

    for (_, listener) in listeners {
      listener(granted);
    }
  }

  /// Run `f` with the next decision, or now if one was already made.
  pub fn on_decision(&self, f: impl FnOnce(bool) + Send + 'static) -> Subscription {
    let mut inner = self.lock();
    let state = inner.state;
    match state {
      ConsentState::Granted | ConsentState::Denied => {
        drop(inner);
        let granted = state == ConsentState::Granted;
        f(granted);
        Subscription::noop()
      }
      ConsentState::Undecided => {
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Box::new(f)));

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
          if let Some(inner) = weak.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.listeners.retain(|(i, _)| *i != id);
          }
        })
      }
    }
  }
}

impl Default for ConsentHandle {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for ConsentHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ConsentHandle")
      .field("state", &self.state())
      .finish()
  }
}
