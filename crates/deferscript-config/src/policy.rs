use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the loader does when a key that already failed is requested again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
  /// Keep the failed entry; new requests observe the cached error.
  #[default]
  StayFailed,
  /// Replace the failed entry with a fresh attempt.
  Retry,
}

/// Runtime loader configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
  #[serde(default)]
  pub on_error: ErrorPolicy,
}

/// What the bundler does when a remote script cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleFailurePolicy {
  /// Fail the build.
  #[default]
  Abort,
  /// Keep the remote locator for that script and continue.
  FallbackToRemote,
}

/// Network policy for build-time fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPolicy {
  /// Total attempts per script, including the first.
  #[serde(default = "default_attempts")]
  pub attempts: u32,
  /// Delay between attempts.
  #[serde(default = "default_delay_ms")]
  pub delay_ms: u64,
  /// Per-request timeout.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

fn default_attempts() -> u32 {
  3
}

fn default_delay_ms() -> u64 {
  1000
}

fn default_timeout_ms() -> u64 {
  15_000
}

impl Default for FetchPolicy {
  fn default() -> Self {
    Self {
      attempts: default_attempts(),
      delay_ms: default_delay_ms(),
      timeout_ms: default_timeout_ms(),
    }
  }
}

/// Build-time bundling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
  /// Directory bundled scripts are written to.
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,

  /// Public path the output directory is served under.
  #[serde(default = "default_public_prefix")]
  pub public_prefix: String,

  #[serde(default)]
  pub fetch: FetchPolicy,

  #[serde(default)]
  pub on_fetch_error: BundleFailurePolicy,

  /// Refetch scripts even if a bundled copy exists.
  #[serde(default)]
  pub force: bool,
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("public/_scripts")
}

fn default_public_prefix() -> String {
  "/_scripts".to_string()
}

impl Default for BundleConfig {
  fn default() -> Self {
    Self {
      output_dir: default_output_dir(),
      public_prefix: default_public_prefix(),
      fetch: FetchPolicy::default(),
      on_fetch_error: BundleFailurePolicy::default(),
      force: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bundle_config_defaults_from_empty_object() {
    let config: BundleConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, BundleConfig::default());
    assert_eq!(config.fetch.attempts, 3);
    assert_eq!(config.on_fetch_error, BundleFailurePolicy::Abort);
  }

  #[test]
  fn test_error_policy_parses_snake_case() {
    let config: LoaderConfig = serde_json::from_str(r#"{"on_error": "retry"}"#).unwrap();
    assert_eq!(config.on_error, ErrorPolicy::Retry);
  }
}
