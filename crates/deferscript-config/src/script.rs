use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::trigger::TriggerDef;

/// A primitive attribute value on a script element.
///
/// `Bool(false)` is treated like an undefined attribute and omitted on
/// insertion. `Bool(true)` renders as a bare attribute (`async`, `defer`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
}

impl fmt::Display for AttrValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AttrValue::Bool(b) => write!(f, "{}", b),
      AttrValue::Int(i) => write!(f, "{}", i),
      AttrValue::Float(x) => write!(f, "{}", x),
      AttrValue::Str(s) => f.write_str(s),
    }
  }
}

impl From<&str> for AttrValue {
  fn from(value: &str) -> Self {
    AttrValue::Str(value.to_string())
  }
}

impl From<String> for AttrValue {
  fn from(value: String) -> Self {
    AttrValue::Str(value)
  }
}

impl From<bool> for AttrValue {
  fn from(value: bool) -> Self {
    AttrValue::Bool(value)
  }
}

impl From<i64> for AttrValue {
  fn from(value: i64) -> Self {
    AttrValue::Int(value)
  }
}

impl From<f64> for AttrValue {
  fn from(value: f64) -> Self {
    AttrValue::Float(value)
  }
}

/// Attribute mapping for a script element.
///
/// A `None` value is an undefined attribute: it is kept in the mapping so
/// adapters can express "not set" but never reaches the document.
pub type Attributes = BTreeMap<String, Option<AttrValue>>;

/// A script declaration in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDef {
  /// Identity key. Defaults to `src` when not set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key: Option<String>,

  /// Remote locator of the script.
  pub src: String,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub attributes: Attributes,

  /// Fetch at build time and serve from the local origin.
  #[serde(default)]
  pub bundle: bool,

  #[serde(default)]
  pub trigger: TriggerDef,
}

impl ScriptDef {
  pub fn new(src: impl Into<String>) -> Self {
    Self {
      key: None,
      src: src.into(),
      attributes: Attributes::new(),
      bundle: false,
      trigger: TriggerDef::default(),
    }
  }

  /// The identity key used for dedup.
  pub fn key(&self) -> &str {
    self.key.as_deref().unwrap_or(&self.src)
  }
}
