use deferscript_loader::ApiError;

/// Why a proxied call did not produce a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
  /// The script never loaded. Queued calls and every later call get this.
  #[error("script '{key}' failed to load: {reason}")]
  ScriptFailed { key: String, reason: String },

  /// The API object raised.
  #[error(transparent)]
  Api(#[from] ApiError),

  /// The proxy went away with the call still queued.
  #[error("call dropped before it settled")]
  Dropped,
}
