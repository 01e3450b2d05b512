//! Deferscript Proxy
//!
//! A [`CallProxy`] stands in for a script's API object before it exists.
//! Calls made while the script is pending are queued; once the loader
//! reports success they replay in submission order and later calls pass
//! straight through. If the script fails, queued and later calls reject.
//!
//! [`DispatchTable`] is a reflection-free [`ApiObject`] built from closures,
//! for bindings and tests that expose a fixed set of paths.
//!
//! [`ApiObject`]: deferscript_loader::ApiObject

mod dispatch;
mod error;
mod pending;
mod proxy;

pub use dispatch::{DispatchTable, arg};
pub use error::CallError;
pub use pending::PendingCall;
pub use proxy::{CallProxy, ProxyMode, ProxyPath};
