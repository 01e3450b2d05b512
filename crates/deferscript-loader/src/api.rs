//! The seam between the runtime and a loaded third-party API.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Errors raised by an API object when a call is dispatched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
  /// Nothing is exposed at this path.
  #[error("no member at '{path}'")]
  UnknownPath { path: String },

  #[error("invalid arguments for '{path}': {message}")]
  InvalidArguments { path: String, message: String },

  /// The underlying call raised.
  #[error("{message}")]
  Thrown { message: String },
}

impl ApiError {
  pub fn thrown(message: impl Into<String>) -> Self {
    Self::Thrown {
      message: message.into(),
    }
  }
}

/// Accessor path into an API object, e.g. `ads.slots.define`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CallPath(Vec<String>);

impl CallPath {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse a dotted path. Empty segments are dropped.
  pub fn parse(path: &str) -> Self {
    Self(
      path
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect(),
    )
  }

  /// A new path with `segment` appended.
  pub fn child(&self, segment: impl Into<String>) -> Self {
    let mut segments = self.0.clone();
    segments.push(segment.into());
    Self(segments)
  }

  pub fn segments(&self) -> &[String] {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for CallPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join("."))
  }
}

impl From<&str> for CallPath {
  fn from(value: &str) -> Self {
    Self::parse(value)
  }
}

impl From<String> for CallPath {
  fn from(value: String) -> Self {
    Self::parse(&value)
  }
}

impl From<Vec<String>> for CallPath {
  fn from(value: Vec<String>) -> Self {
    Self(value)
  }
}

/// A loaded third-party API.
///
/// Every member access goes through one entry point keyed by path, so no
/// runtime reflection is needed to route calls.
pub trait ApiObject: Send + Sync {
  fn invoke(&self, path: &CallPath, args: &[Value]) -> Result<Value, ApiError>;
}

pub type SharedApi = Arc<dyn ApiObject>;
