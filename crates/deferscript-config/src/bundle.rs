use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Output of the bundling step: remote locator to local locator.
///
/// Written next to the bundled assets and read back by the runtime so
/// bundled scripts are inserted from the local origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
  #[serde(default)]
  pub scripts: BTreeMap<String, String>,

  /// Remote locators kept because their fetch failed under the
  /// fallback policy.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub fallbacks: Vec<String>,
}

impl BundleManifest {
  pub fn insert(&mut self, remote: impl Into<String>, local: impl Into<String>) {
    self.scripts.insert(remote.into(), local.into());
  }

  /// Local locator for a remote one, if it was bundled.
  pub fn locator_for(&self, remote: &str) -> Option<&str> {
    self.scripts.get(remote).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.scripts.is_empty()
  }

  pub fn from_json(content: &str) -> Result<Self, crate::ConfigError> {
    Ok(serde_json::from_str(content)?)
  }
}
