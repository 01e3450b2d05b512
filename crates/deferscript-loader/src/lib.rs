//! Deferscript Loader
//!
//! This crate owns the script lifecycle. A [`ScriptLoader`] inserts each
//! identity key into the [`Document`] at most once, drives the
//! [`LoadStatus`] state machine from the document's load signals, and fans
//! the outcome out to every [`LoadHandle`] holding that key.
//!
//! ```text
//! AwaitingTrigger ──trigger──▶ Loading ──load──▶ Loaded
//!                                  │
//!                                  └────error───▶ Error
//! ```
//!
//! The third-party API object is never looked up ad hoc: once a script
//! loads, the request's `use` function extracts it from the injected
//! [`GlobalScope`].

mod api;
mod document;
mod entry;
mod error;
mod handle;
mod loader;
mod resource;
mod status;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{ApiError, ApiObject, CallPath, SharedApi};
pub use document::{Document, GlobalScope, LoadSignal};
pub use error::LoadFailure;
pub use handle::LoadHandle;
pub use loader::{LoadRequest, ScriptLoader, UseFn};
pub use resource::{ScriptElement, ScriptResource};
pub use status::LoadStatus;
