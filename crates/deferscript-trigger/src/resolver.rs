//! Trigger resolution.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::environment::{RenderMode, TriggerEnvironment};
use crate::gate::{GatePhase, TriggerGate};
use crate::scope::Scope;
use crate::spec::TriggerSpec;

/// A trigger bound to its gate.
///
/// Every resolved trigger can also be resolved by hand through
/// [`load`](Self::load), which is how manual triggers fire and how callers
/// opt in early on automatic ones.
#[derive(Clone, Debug)]
pub struct ResolvedTrigger {
  gate: TriggerGate,
  kind: &'static str,
  deferred: bool,
}

impl ResolvedTrigger {
  /// A trigger produced during server rendering. It never resolves.
  pub fn deferred(kind: &'static str) -> Self {
    Self {
      gate: TriggerGate::new(),
      kind,
      deferred: true,
    }
  }

  /// A trigger that has already resolved to `proceed`.
  pub fn resolved(proceed: bool) -> Self {
    let gate = TriggerGate::new();
    gate.resolve(proceed);
    Self {
      gate,
      kind: "resolved",
      deferred: false,
    }
  }

  pub fn gate(&self) -> &TriggerGate {
    &self.gate
  }

  pub fn kind(&self) -> &'static str {
    self.kind
  }

  /// True when produced during server rendering.
  pub fn is_deferred(&self) -> bool {
    self.deferred
  }

  /// Resolve the trigger now. Returns `true` if this call settled it.
  pub fn load(&self) -> bool {
    if self.deferred {
      debug!(trigger = self.kind, "load requested during server render, ignoring");
      return false;
    }
    self.gate.resolve(true)
  }

  pub fn phase(&self) -> GatePhase {
    self.gate.phase()
  }

  pub fn outcome(&self) -> Option<bool> {
    self.gate.outcome()
  }

  /// Wait until the trigger settles. `None` if its scope was disposed.
  pub async fn settled(&self) -> Option<bool> {
    self.gate.settled().await
  }
}

/// Resolves [`TriggerSpec`]s against an environment.
#[derive(Clone)]
pub struct TriggerResolver {
  env: Arc<dyn TriggerEnvironment>,
}

impl TriggerResolver {
  pub fn new(env: Arc<dyn TriggerEnvironment>) -> Self {
    Self { env }
  }

  pub fn render_mode(&self) -> RenderMode {
    self.env.render_mode()
  }

  /// Resolve a trigger spec into a gate owned by `scope`.
  ///
  /// During server rendering the environment is never touched and a
  /// deferred trigger is returned.
  pub fn resolve(&self, spec: TriggerSpec, scope: &Scope) -> ResolvedTrigger {
    let kind = spec.kind();

    if self.env.render_mode() == RenderMode::Server {
      debug!(trigger = kind, "server render, trigger deferred");
      return ResolvedTrigger::deferred(kind);
    }

    let gate = TriggerGate::new();
    scope.adopt(&gate);

    if gate.is_pending() {
      self.wire(spec, &gate, scope);
    }

    debug!(trigger = kind, phase = ?gate.phase(), "trigger resolved");

    ResolvedTrigger {
      gate,
      kind,
      deferred: false,
    }
  }

  fn wire(&self, spec: TriggerSpec, gate: &TriggerGate, scope: &Scope) {
    match spec {
      TriggerSpec::Immediate => {
        gate.resolve(true);
      }
      TriggerSpec::Manual => {}
      TriggerSpec::OnReady => {
        let weak = gate.downgrade();
        let subscription = self.env.on_ready(Arc::new(move || {
          weak.resolve(true);
        }));
        gate.hold(subscription);
      }
      TriggerSpec::Element { element, kinds } => {
        if kinds.is_empty() {
          warn!(element = %element, "element trigger has no interaction kinds and will never fire");
          return;
        }

        // Server markup may already reflect the interaction.
        if let Some(kind) = kinds
          .iter()
          .copied()
          .find(|kind| self.env.is_satisfied(&element, *kind))
        {
          debug!(element = %element, kind = %kind, "interaction already satisfied at hydration");
          gate.resolve(true);
          return;
        }

        for kind in kinds {
          let weak = gate.downgrade();
          let target = element.clone();
          let subscription = self.env.observe(
            &element,
            kind,
            Arc::new(move || {
              if weak.resolve(true) {
                debug!(element = %target, kind = %kind, "element trigger fired");
              }
            }),
          );
          gate.hold(subscription);
        }
      }
      TriggerSpec::Signal(future) => self.spawn(gate, scope, future),
      TriggerSpec::IdleTimeout(delay) => self.spawn(
        gate,
        scope,
        async move {
          tokio::time::sleep(delay).await;
          true
        }
        .boxed(),
      ),
      TriggerSpec::Consent { consent, then } => {
        let weak = gate.downgrade();
        let resolver = self.clone();
        let scope = scope.clone();
        let subscription = consent.on_decision(move |granted| {
          let Some(gate) = weak.upgrade() else {
            return;
          };
          if !granted {
            debug!("consent denied, trigger will not proceed");
            gate.resolve(false);
            return;
          }
          match then {
            Some(next) => resolver.wire(*next, &gate, &scope),
            None => {
              gate.resolve(true);
            }
          }
        });
        gate.hold(subscription);
      }
    }
  }

  fn spawn(&self, gate: &TriggerGate, scope: &Scope, future: BoxFuture<'static, bool>) {
    let handle = match tokio::runtime::Handle::try_current() {
      Ok(handle) => handle,
      Err(_) => {
        warn!("no async runtime available, trigger left pending");
        return;
      }
    };

    let gate = gate.clone();
    let token = scope.token().clone();
    handle.spawn(async move {
      tokio::select! {
        _ = token.cancelled() => {
          debug!("scope disposed before async trigger resolved");
        }
        proceed = future => {
          gate.resolve(proceed);
        }
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use deferscript_config::InteractionKind;

  use super::*;
  use crate::consent::ConsentHandle;
  use crate::testing::FakeEnvironment;

  fn client() -> (Arc<FakeEnvironment>, TriggerResolver) {
    let env = Arc::new(FakeEnvironment::client());
    (env.clone(), TriggerResolver::new(env))
  }

  #[test]
  fn test_immediate_resolves_at_once() {
    let (_, resolver) = client();
    let trigger = resolver.resolve(TriggerSpec::Immediate, &Scope::new());
    assert_eq!(trigger.outcome(), Some(true));
  }

  #[test]
  fn test_manual_waits_for_load() {
    let (_, resolver) = client();
    let trigger = resolver.resolve(TriggerSpec::Manual, &Scope::new());
    assert_eq!(trigger.outcome(), None);

    assert!(trigger.load());
    assert!(!trigger.load());
    assert_eq!(trigger.outcome(), Some(true));
  }

  #[test]
  fn test_on_ready_resolves_on_ready_event() {
    let (env, resolver) = client();
    let trigger = resolver.resolve(TriggerSpec::OnReady, &Scope::new());
    assert!(trigger.gate().is_pending());

    env.fire_ready();
    assert_eq!(trigger.outcome(), Some(true));
    assert_eq!(env.listener_count(), 0);
  }

  #[test]
  fn test_on_ready_when_already_ready() {
    let (env, resolver) = client();
    env.fire_ready();

    let trigger = resolver.resolve(TriggerSpec::OnReady, &Scope::new());
    assert_eq!(trigger.outcome(), Some(true));
  }

  #[test]
  fn test_element_trigger_resolves_once_and_releases_listener() {
    let (env, resolver) = client();
    let trigger = resolver.resolve(
      TriggerSpec::element("#player", InteractionKind::Visible),
      &Scope::new(),
    );

    let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let f = fired.clone();
    trigger.gate().on_resolve(move |_| {
      f.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    assert_eq!(env.fire(&"#player".into(), InteractionKind::Visible), 1);
    assert_eq!(env.fire(&"#player".into(), InteractionKind::Visible), 0);
    assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(env.listener_count(), 0);
  }

  #[test]
  fn test_element_trigger_without_kinds_observes_nothing() {
    let (env, resolver) = client();
    let trigger = resolver.resolve(
      TriggerSpec::Element {
        element: "#player".into(),
        kinds: Vec::new(),
      },
      &Scope::new(),
    );

    assert!(trigger.gate().is_pending());
    assert_eq!(env.observe_calls(), 0);
    assert_eq!(env.listener_count(), 0);
    assert!(trigger.load());
    assert_eq!(trigger.outcome(), Some(true));
  }

  #[test]
  fn test_element_trigger_ignores_other_elements_and_kinds() {
    let (env, resolver) = client();
    let trigger = resolver.resolve(
      TriggerSpec::element("#player", InteractionKind::Hover),
      &Scope::new(),
    );

    env.fire(&"#other".into(), InteractionKind::Hover);
    env.fire(&"#player".into(), InteractionKind::Click);
    assert!(trigger.gate().is_pending());

    env.fire(&"#player".into(), InteractionKind::Hover);
    assert_eq!(trigger.outcome(), Some(true));
  }

  #[test]
  fn test_element_trigger_with_many_kinds_fires_on_first() {
    let (env, resolver) = client();
    let trigger = resolver.resolve(
      TriggerSpec::Element {
        element: "#ad".into(),
        kinds: vec![InteractionKind::Hover, InteractionKind::MouseDown],
      },
      &Scope::new(),
    );
    assert_eq!(env.listener_count(), 2);

    env.fire(&"#ad".into(), InteractionKind::MouseDown);
    assert_eq!(trigger.outcome(), Some(true));
    assert_eq!(env.listener_count(), 0);
  }

  #[test]
  fn test_hydration_resolves_without_new_event() {
    let (env, resolver) = client();
    env.set_satisfied(&"#player".into(), InteractionKind::Hover);

    let trigger = resolver.resolve(
      TriggerSpec::element("#player", InteractionKind::Hover),
      &Scope::new(),
    );

    assert_eq!(trigger.outcome(), Some(true));
    assert_eq!(env.listener_count(), 0);
  }

  #[test]
  fn test_server_render_defers_without_touching_environment() {
    let env = Arc::new(FakeEnvironment::server());
    let resolver = TriggerResolver::new(env.clone());

    let trigger = resolver.resolve(
      TriggerSpec::element("#player", InteractionKind::Visible),
      &Scope::new(),
    );

    assert!(trigger.is_deferred());
    assert!(!trigger.load());
    assert_eq!(env.listener_count(), 0);
    assert_eq!(env.observe_calls(), 0);
  }

  #[test]
  fn test_dispose_unregisters_listeners() {
    let (env, resolver) = client();
    let scope = Scope::new();
    let trigger = resolver.resolve(
      TriggerSpec::element("#player", InteractionKind::Visible),
      &scope,
    );
    assert_eq!(env.listener_count(), 1);

    scope.dispose();

    assert_eq!(env.listener_count(), 0);
    assert_eq!(env.fire(&"#player".into(), InteractionKind::Visible), 0);
    assert_eq!(trigger.phase(), GatePhase::Cancelled);
  }

  #[test]
  fn test_consent_then_manual() {
    let (_, resolver) = client();
    let consent = ConsentHandle::new();
    let trigger = resolver.resolve(
      TriggerSpec::Consent {
        consent: consent.clone(),
        then: Some(Box::new(TriggerSpec::Manual)),
      },
      &Scope::new(),
    );

    consent.accept();
    assert!(trigger.gate().is_pending());

    trigger.load();
    assert_eq!(trigger.outcome(), Some(true));
  }

  #[test]
  fn test_consent_then_element_wires_after_grant() {
    let (env, resolver) = client();
    let consent = ConsentHandle::new();
    let trigger = resolver.resolve(
      TriggerSpec::Consent {
        consent: consent.clone(),
        then: Some(Box::new(TriggerSpec::element("#map", InteractionKind::Click))),
      },
      &Scope::new(),
    );
    assert_eq!(env.observe_calls(), 0);

    consent.accept();
    assert_eq!(env.observe_calls(), 1);

    env.fire(&"#map".into(), InteractionKind::Click);
    assert_eq!(trigger.outcome(), Some(true));
  }

  #[test]
  fn test_consent_denied_resolves_false() {
    let (_, resolver) = client();
    let consent = ConsentHandle::new();
    let trigger = resolver.resolve(TriggerSpec::consent(&consent), &Scope::new());

    consent.deny();
    assert_eq!(trigger.outcome(), Some(false));
  }

  #[tokio::test]
  async fn test_signal_resolves_with_future_value() {
    let (_, resolver) = client();
    let (tx, rx) = tokio::sync::oneshot::channel::<bool>();
    let trigger = resolver.resolve(
      TriggerSpec::signal(async move { rx.await.unwrap_or(false) }),
      &Scope::new(),
    );

    tx.send(true).unwrap();
    assert_eq!(trigger.settled().await, Some(true));
  }

  #[tokio::test]
  async fn test_signal_cancelled_by_scope() {
    let (_, resolver) = client();
    let scope = Scope::new();
    let trigger = resolver.resolve(
      TriggerSpec::signal(futures::future::pending::<bool>()),
      &scope,
    );

    scope.dispose();
    assert_eq!(trigger.settled().await, None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_idle_timeout_resolves_after_delay() {
    let (_, resolver) = client();
    let trigger = resolver.resolve(
      TriggerSpec::IdleTimeout(Duration::from_millis(500)),
      &Scope::new(),
    );
    assert!(trigger.gate().is_pending());

    assert_eq!(trigger.settled().await, Some(true));
  }
}
