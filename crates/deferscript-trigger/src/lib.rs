//! Deferscript Trigger
//!
//! This crate decides *when* a script may be inserted. A declarative
//! [`TriggerSpec`] is resolved against a [`TriggerEnvironment`] into a
//! [`ResolvedTrigger`], which wraps a one-shot [`TriggerGate`].
//!
//! Gates resolve at most once. Continuations registered with
//! [`TriggerGate::on_resolve`] run synchronously at resolution, in
//! registration order, which is how the loader hooks insertion onto a trigger
//! without spawning tasks.
//!
//! Environment wiring (ready events, element observers) is isolated behind
//! [`TriggerEnvironment`], so the same resolver runs during server rendering
//! (where every trigger is deferred) and on the client.

mod consent;
mod environment;
mod gate;
mod resolver;
mod scope;
mod spec;
mod subscription;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use consent::{ConsentHandle, ConsentState};
pub use deferscript_config::InteractionKind;
pub use environment::{ElementRef, EventCallback, RenderMode, TriggerEnvironment};
pub use gate::{GatePhase, TriggerGate, WeakTriggerGate};
pub use resolver::{ResolvedTrigger, TriggerResolver};
pub use scope::Scope;
pub use spec::TriggerSpec;
pub use subscription::Subscription;
