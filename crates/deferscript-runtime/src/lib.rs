//! Deferscript Runtime
//!
//! The caller-facing surface. [`ScriptRuntime`] resolves a trigger, hands the
//! request to the loader and attaches a shared call proxy, returning a
//! [`ScriptInstance`] that exposes status, manual loading, hooks and the
//! proxy in one place.
//!
//! Integrations for specific third-party services implement
//! [`RegistryScript`] and are loaded through
//! [`ScriptRuntime::use_registry_script`].

mod instance;
mod registry;
mod runtime;

pub use deferscript_loader::LoadRequest as ScriptRequest;
pub use instance::ScriptInstance;
pub use registry::{RegistryScript, UseScriptOptions};
pub use runtime::ScriptRuntime;
