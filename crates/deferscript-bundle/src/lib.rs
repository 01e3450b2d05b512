//! Deferscript Bundle
//!
//! The build-time half of deferscript. Scripts declared with `bundle: true`
//! are fetched once, written to an [`AssetStore`] under a content-addressed
//! name, and recorded in a [`BundleManifest`] that the runtime uses to serve
//! them from the local origin.
//!
//! Fetching goes through the [`Fetcher`] trait so builds can be tested
//! without a network. [`HttpFetcher`] is the `reqwest` implementation.
//!
//! [`BundleManifest`]: deferscript_config::BundleManifest

mod bundler;
mod error;
mod fetch;
mod fs;
mod store;

pub use bundler::{Bundler, asset_name};
pub use error::{BundleError, FetchError};
pub use fetch::{Fetcher, HttpFetcher};
pub use fs::FsAssetStore;
pub use store::{AssetStore, ByteStream, StoreError, into_stream};
