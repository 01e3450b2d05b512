use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse manifest: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("script '{key}' has an empty src")]
  EmptySrc { key: String },

  #[error("script key '{key}' is declared twice with different sources")]
  ConflictingKey { key: String },

  #[error("invalid trigger for script '{key}': {message}")]
  InvalidTrigger { key: String, message: String },
}
