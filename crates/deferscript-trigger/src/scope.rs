//! Ownership scope for pending triggers.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::gate::TriggerGate;

/// The lifetime a trigger belongs to, typically a mounted component.
///
/// Disposing the scope cancels every gate still pending in it, which
/// unregisters their listeners and stops async resolutions. Resources that
/// were already inserted stay in the document.
#[derive(Clone, Default)]
pub struct Scope {
  token: CancellationToken,
  gates: Arc<Mutex<Vec<TriggerGate>>>,
}

impl Scope {
  pub fn new() -> Self {
    Self::default()
  }

  /// Token cancelled when the scope is disposed.
  pub fn token(&self) -> &CancellationToken {
    &self.token
  }

  pub fn is_disposed(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Track a gate so disposal can cancel it.
  pub(crate) fn adopt(&self, gate: &TriggerGate) {
    if self.is_disposed() {
      gate.cancel();
      return;
    }

    let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
    gates.retain(|g| g.is_pending());
    gates.push(gate.clone());
  }

  /// Dispose the scope. Idempotent.
  pub fn dispose(&self) {
    self.token.cancel();

    let gates = std::mem::take(&mut *self.gates.lock().unwrap_or_else(PoisonError::into_inner));
    let pending = gates.iter().filter(|g| g.is_pending()).count();
    for gate in gates {
      gate.cancel();
    }

    debug!(pending_triggers = pending, "scope disposed");
  }
}

impl std::fmt::Debug for Scope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Scope")
      .field("disposed", &self.is_disposed())
      .finish()
  }
}
