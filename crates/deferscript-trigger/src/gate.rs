//! One-shot resolution gate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::debug;

use crate::subscription::Subscription;

/// Observable phase of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
  Pending,
  /// Resolved with "should proceed".
  Resolved(bool),
  /// The owning scope was disposed before resolution.
  Cancelled,
}

type Continuation = Box<dyn FnOnce(bool) + Send>;

struct GateState {
  phase: GatePhase,
  continuations: Vec<Continuation>,
  /// Listeners kept alive until the gate settles.
  held: Vec<Subscription>,
}

struct GateInner {
  state: Mutex<GateState>,
  phase_tx: watch::Sender<GatePhase>,
}

/// A trigger that resolves at most once.
///
/// Clones share the same gate.
#[derive(Clone)]
pub struct TriggerGate {
  inner: Arc<GateInner>,
}

/// Non-owning reference to a gate, used inside environment callbacks so a
/// registered listener does not keep the gate alive.
#[derive(Clone)]
pub struct WeakTriggerGate {
  inner: Weak<GateInner>,
}

impl TriggerGate {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(GateInner {
        state: Mutex::new(GateState {
          phase: GatePhase::Pending,
          continuations: Vec::new(),
          held: Vec::new(),
        }),
        phase_tx: watch::Sender::new(GatePhase::Pending),
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, GateState> {
    self
      .inner
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Resolve the gate. Returns `true` if this call settled it.
  ///
  /// Later calls, and calls after cancellation, are no-ops.
  pub fn resolve(&self, proceed: bool) -> bool {
    let (continuations, held) = {
      let mut state = self.lock();
      if state.phase != GatePhase::Pending {
        debug!(phase = ?state.phase, "ignoring repeated trigger resolution");
        return false;
      }
      state.phase = GatePhase::Resolved(proceed);
      self.inner.phase_tx.send_replace(state.phase);
      (
        std::mem::take(&mut state.continuations),
        std::mem::take(&mut state.held),
      )
    };

    // Release listeners before running continuations so nothing fires
    // against a settled gate.
    drop(held);

    for continuation in continuations {
      continuation(proceed);
    }

    true
  }

  /// Cancel a pending gate and release its listeners.
  ///
  /// Continuations are dropped without running.
  pub fn cancel(&self) {
    let (continuations, held) = {
      let mut state = self.lock();
      if state.phase != GatePhase::Pending {
        return;
      }
      state.phase = GatePhase::Cancelled;
      self.inner.phase_tx.send_replace(state.phase);
      (
        std::mem::take(&mut state.continuations),
        std::mem::take(&mut state.held),
      )
    };

    drop(held);
    drop(continuations);
  }

  /// Run `f` when the gate resolves, or now if it already has.
  ///
  /// Continuations run in registration order. A cancelled gate never runs
  /// them.
  pub fn on_resolve(&self, f: impl FnOnce(bool) + Send + 'static) {
    let resolved = {
      let mut state = self.lock();
      match state.phase {
        GatePhase::Pending => {
          state.continuations.push(Box::new(f));
          return;
        }
        GatePhase::Resolved(proceed) => proceed,
        GatePhase::Cancelled => return,
      }
    };

    f(resolved);
  }

  /// Keep a listener registered until the gate settles.
  ///
  /// If the gate already settled the subscription is released immediately.
  pub fn hold(&self, subscription: Subscription) {
    let mut state = self.lock();
    if state.phase == GatePhase::Pending {
      state.held.push(subscription);
    } else {
      drop(state);
      drop(subscription);
    }
  }

  pub fn phase(&self) -> GatePhase {
    self.lock().phase
  }

  /// The resolution outcome, if resolved.
  pub fn outcome(&self) -> Option<bool> {
    match self.phase() {
      GatePhase::Resolved(proceed) => Some(proceed),
      _ => None,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.phase() == GatePhase::Pending
  }

  /// Number of listeners currently held.
  pub fn held_listeners(&self) -> usize {
    self.lock().held.len()
  }

  /// Subscribe to phase changes.
  pub fn watch(&self) -> watch::Receiver<GatePhase> {
    self.inner.phase_tx.subscribe()
  }

  /// Wait until the gate settles.
  ///
  /// Returns `None` if it was cancelled.
  pub async fn settled(&self) -> Option<bool> {
    let mut rx = self.watch();
    let phase = match rx.wait_for(|p| *p != GatePhase::Pending).await {
      Ok(phase) => *phase,
      Err(_) => self.phase(),
    };

    match phase {
      GatePhase::Resolved(proceed) => Some(proceed),
      _ => None,
    }
  }

  pub fn downgrade(&self) -> WeakTriggerGate {
    WeakTriggerGate {
      inner: Arc::downgrade(&self.inner),
    }
  }
}

impl Default for TriggerGate {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for TriggerGate {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TriggerGate")
      .field("phase", &self.phase())
      .finish()
  }
}

impl WeakTriggerGate {
  pub fn upgrade(&self) -> Option<TriggerGate> {
    self.inner.upgrade().map(|inner| TriggerGate { inner })
  }

  /// Resolve the gate if it is still alive.
  pub fn resolve(&self, proceed: bool) -> bool {
    self
      .upgrade()
      .map(|gate| gate.resolve(proceed))
      .unwrap_or(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn test_resolves_at_most_once() {
    let gate = TriggerGate::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    gate.on_resolve(move |_| {
      f.fetch_add(1, Ordering::SeqCst);
    });

    assert!(gate.resolve(true));
    assert!(!gate.resolve(true));
    assert!(!gate.resolve(false));

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(gate.outcome(), Some(true));
  }

  #[test]
  fn test_continuations_run_in_registration_order() {
    let gate = TriggerGate::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
      let order = order.clone();
      gate.on_resolve(move |_| order.lock().unwrap().push(i));
    }
    gate.resolve(true);

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
  }

  #[test]
  fn test_late_continuation_runs_immediately_with_outcome() {
    let gate = TriggerGate::new();
    gate.resolve(false);

    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    gate.on_resolve(move |proceed| *s.lock().unwrap() = Some(proceed));

    assert_eq!(*seen.lock().unwrap(), Some(false));
  }

  #[test]
  fn test_cancel_releases_listeners_and_blocks_resolution() {
    let gate = TriggerGate::new();
    let released = Arc::new(AtomicUsize::new(0));
    let r = released.clone();
    gate.hold(Subscription::new(move || {
      r.fetch_add(1, Ordering::SeqCst);
    }));
    gate.on_resolve(|_| panic!("continuation must not run after cancel"));

    gate.cancel();

    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert!(!gate.resolve(true));
    assert_eq!(gate.phase(), GatePhase::Cancelled);
  }

  #[test]
  fn test_hold_after_resolution_releases_immediately() {
    let gate = TriggerGate::new();
    gate.resolve(true);

    let released = Arc::new(AtomicUsize::new(0));
    let r = released.clone();
    gate.hold(Subscription::new(move || {
      r.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(gate.held_listeners(), 0);
  }

  #[test]
  fn test_weak_gate_does_not_keep_gate_alive() {
    let gate = TriggerGate::new();
    let weak = gate.downgrade();
    drop(gate);

    assert!(!weak.resolve(true));
  }

  #[tokio::test]
  async fn test_settled_waits_for_resolution() {
    let gate = TriggerGate::new();
    let g = gate.clone();
    tokio::spawn(async move {
      g.resolve(true);
    });

    assert_eq!(gate.settled().await, Some(true));
  }

  #[tokio::test]
  async fn test_settled_returns_none_when_cancelled() {
    let gate = TriggerGate::new();
    gate.cancel();
    assert_eq!(gate.settled().await, None);
  }
}
