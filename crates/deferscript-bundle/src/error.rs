use deferscript_config::ConfigError;

use crate::store::StoreError;

/// A single failed fetch attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
  #[error("server returned {status}")]
  Status { status: u16 },

  #[error("request timed out after {ms}ms")]
  Timeout { ms: u64 },

  #[error("transport error: {0}")]
  Transport(String),
}

/// Errors that stop a bundling run.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
  /// Every attempt to fetch a script failed.
  #[error("failed to fetch '{locator}' after {attempts} attempt(s): {source}")]
  Fetch {
    locator: String,
    attempts: u32,
    #[source]
    source: FetchError,
  },

  #[error("asset store error: {0}")]
  Store(#[from] StoreError),

  #[error("invalid manifest: {0}")]
  Config(#[from] ConfigError),
}
