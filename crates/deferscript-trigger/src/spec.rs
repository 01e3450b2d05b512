use std::fmt;
use std::future::Future;
use std::time::Duration;

use deferscript_config::{InteractionKind, TriggerDef};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::consent::ConsentHandle;
use crate::environment::ElementRef;

/// What authorizes inserting a script.
#[derive(Default)]
pub enum TriggerSpec {
  /// Resolve as soon as the trigger is resolved.
  Immediate,
  /// Resolve on the host's ready/idle event.
  #[default]
  OnReady,
  /// Resolve only through [`ResolvedTrigger::load`](crate::ResolvedTrigger::load).
  Manual,
  /// Resolve with the value of an external future.
  Signal(BoxFuture<'static, bool>),
  /// Resolve on the first qualifying interaction of any listed kind.
  Element {
    element: ElementRef,
    kinds: Vec<InteractionKind>,
  },
  /// Resolve after a delay.
  IdleTimeout(Duration),
  /// Resolve once consent is granted, then through `then` if set.
  /// A denial resolves to "do not proceed".
  Consent {
    consent: ConsentHandle,
    then: Option<Box<TriggerSpec>>,
  },
}

impl TriggerSpec {
  pub fn signal(future: impl Future<Output = bool> + Send + 'static) -> Self {
    TriggerSpec::Signal(future.boxed())
  }

  pub fn element(element: impl Into<ElementRef>, kind: InteractionKind) -> Self {
    TriggerSpec::Element {
      element: element.into(),
      kinds: vec![kind],
    }
  }

  pub fn consent(consent: &ConsentHandle) -> Self {
    TriggerSpec::Consent {
      consent: consent.clone(),
      then: None,
    }
  }

  /// Build a spec from a manifest definition.
  ///
  /// Consent definitions bind to the given application consent handle.
  pub fn from_def(def: &TriggerDef, consent: &ConsentHandle) -> Self {
    match def {
      TriggerDef::Immediate => TriggerSpec::Immediate,
      TriggerDef::OnReady => TriggerSpec::OnReady,
      TriggerDef::Manual => TriggerSpec::Manual,
      TriggerDef::Element { element, kinds } => TriggerSpec::Element {
        element: ElementRef::new(element.clone()),
        kinds: kinds.clone(),
      },
      TriggerDef::IdleTimeout { ms } => TriggerSpec::IdleTimeout(Duration::from_millis(*ms)),
      TriggerDef::Consent { then } => TriggerSpec::Consent {
        consent: consent.clone(),
        then: then
          .as_ref()
          .map(|inner| Box::new(TriggerSpec::from_def(inner, consent))),
      },
    }
  }

  /// Short name for logs.
  pub fn kind(&self) -> &'static str {
    match self {
      TriggerSpec::Immediate => "immediate",
      TriggerSpec::OnReady => "on_ready",
      TriggerSpec::Manual => "manual",
      TriggerSpec::Signal(_) => "signal",
      TriggerSpec::Element { .. } => "element",
      TriggerSpec::IdleTimeout(_) => "idle_timeout",
      TriggerSpec::Consent { .. } => "consent",
    }
  }
}

impl fmt::Debug for TriggerSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TriggerSpec::Element { element, kinds } => f
        .debug_struct("Element")
        .field("element", element)
        .field("kinds", kinds)
        .finish(),
      TriggerSpec::IdleTimeout(d) => f.debug_tuple("IdleTimeout").field(d).finish(),
      TriggerSpec::Consent { consent, then } => f
        .debug_struct("Consent")
        .field("consent", consent)
        .field("then", then)
        .finish(),
      other => f.write_str(other.kind()),
    }
  }
}
