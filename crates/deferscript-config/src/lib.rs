//! Deferscript Config
//!
//! This crate contains the serializable configuration types for deferscript.
//! These types describe scripts, their triggers and the loader/bundler
//! policies before they are turned into runtime structures.
//!
//! Configuration is loaded from JSON manifests (via the CLI with
//! `--manifest=scripts.json`) or built directly in code.
//!
//! # Example
//!
//! ```json
//! {
//!   "loader": { "on_error": "stay_failed" },
//!   "bundle": { "public_prefix": "/_scripts", "on_fetch_error": "fallback_to_remote" },
//!   "scripts": [
//!     {
//!       "key": "analytics",
//!       "src": "https://cdn.example.com/analytics.js",
//!       "attributes": { "async": true, "data-site": "abc" },
//!       "bundle": true,
//!       "trigger": { "element": { "element": "#player", "kinds": ["visible"] } }
//!     }
//!   ]
//! }
//! ```

mod bundle;
mod error;
mod manifest;
mod policy;
mod script;
mod trigger;

pub use bundle::BundleManifest;
pub use error::ConfigError;
pub use manifest::ScriptManifest;
pub use policy::{BundleConfig, BundleFailurePolicy, ErrorPolicy, FetchPolicy, LoaderConfig};
pub use script::{AttrValue, Attributes, ScriptDef};
pub use trigger::{InteractionKind, TriggerDef};
