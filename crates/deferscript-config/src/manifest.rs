use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::{BundleConfig, LoaderConfig};
use crate::script::ScriptDef;

/// A set of scripts plus the policies they are loaded and bundled with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptManifest {
  #[serde(default)]
  pub loader: LoaderConfig,

  #[serde(default)]
  pub bundle: BundleConfig,

  #[serde(default)]
  pub scripts: Vec<ScriptDef>,
}

impl ScriptManifest {
  /// Parse and validate a manifest from JSON.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let manifest: ScriptManifest = serde_json::from_str(content)?;
    manifest.validate()?;
    Ok(manifest)
  }

  /// Check that every script has a source, keys do not collide across
  /// different sources, and triggers are well formed.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();

    for script in &self.scripts {
      let key = script.key();

      if script.src.trim().is_empty() {
        return Err(ConfigError::EmptySrc {
          key: key.to_string(),
        });
      }

      if let Some(previous_src) = seen.insert(key, &script.src)
        && previous_src != script.src
      {
        return Err(ConfigError::ConflictingKey {
          key: key.to_string(),
        });
      }

      script
        .trigger
        .validate()
        .map_err(|message| ConfigError::InvalidTrigger {
          key: key.to_string(),
          message,
        })?;
    }

    Ok(())
  }

  /// Scripts marked for build-time bundling.
  pub fn bundled(&self) -> impl Iterator<Item = &ScriptDef> {
    self.scripts.iter().filter(|s| s.bundle)
  }
}
