use thiserror::Error;

/// Why a load attempt ended in [`LoadStatus::Error`](crate::LoadStatus::Error).
///
/// Failures are reported through status and `on_error` subscribers, never
/// returned from `load()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
  /// The resource could not be fetched.
  #[error("network error: {message}")]
  Network { message: String },

  /// The resource was fetched but failed to evaluate.
  #[error("parse error: {message}")]
  Parse { message: String },

  /// The script loaded but its API object was not found.
  #[error("script '{key}' loaded but exposed no API")]
  MissingApi { key: String },

  /// The script was removed before it finished loading.
  #[error("script '{key}' was removed")]
  Removed { key: String },
}

impl LoadFailure {
  pub fn network(message: impl Into<String>) -> Self {
    Self::Network {
      message: message.into(),
    }
  }

  pub fn parse(message: impl Into<String>) -> Self {
    Self::Parse {
      message: message.into(),
    }
  }
}
