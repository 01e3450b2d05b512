use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use deferscript_config::{BundleConfig, BundleFailurePolicy, BundleManifest, ScriptManifest};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::error::{BundleError, FetchError};
use crate::fetch::Fetcher;
use crate::store::{AssetStore, into_stream};

/// Content-addressed file name for a remote locator.
///
/// The first 16 hex characters of the locator's SHA-256, plus `.js`.
pub fn asset_name(locator: &str) -> String {
  let digest = hex::encode(Sha256::digest(locator.as_bytes()));
  format!("{}.js", &digest[..16])
}

/// Fetches bundled scripts into an asset store.
pub struct Bundler {
  fetcher: Arc<dyn Fetcher>,
  store: Arc<dyn AssetStore>,
  config: BundleConfig,
}

impl Bundler {
  pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn AssetStore>, config: BundleConfig) -> Self {
    Self {
      fetcher,
      store,
      config,
    }
  }

  pub fn config(&self) -> &BundleConfig {
    &self.config
  }

  /// Local locator a bundled script is served from.
  pub fn local_locator(&self, locator: &str) -> String {
    format!(
      "{}/{}",
      self.config.public_prefix.trim_end_matches('/'),
      asset_name(locator)
    )
  }

  /// Bundle every script in `manifest` marked for bundling.
  ///
  /// Scripts sharing a locator are fetched once.
  #[instrument(
    name = "bundle",
    skip(self, manifest),
    fields(scripts = manifest.scripts.len(), force = self.config.force)
  )]
  pub async fn bundle(&self, manifest: &ScriptManifest) -> Result<BundleManifest, BundleError> {
    manifest.validate()?;

    let mut output = BundleManifest::default();
    let mut seen = HashSet::new();

    for def in manifest.bundled() {
      if !seen.insert(def.src.as_str()) {
        continue;
      }
      self.bundle_one(&def.src, &mut output).await?;
    }

    info!(
      bundled = output.scripts.len(),
      fallbacks = output.fallbacks.len(),
      "bundling finished"
    );
    Ok(output)
  }

  async fn bundle_one(&self, locator: &str, output: &mut BundleManifest) -> Result<(), BundleError> {
    let name = asset_name(locator);
    let local = self.local_locator(locator);

    if !self.config.force && self.store.exists(&name).await? {
      debug!(locator = %locator, asset = %name, "already bundled, skipping fetch");
      output.insert(locator, local);
      return Ok(());
    }

    match self.fetch_with_retry(locator).await {
      Ok(bytes) => {
        let size = bytes.len();
        self.store.put(&name, into_stream(bytes)).await?;
        info!(locator = %locator, asset = %name, size, "script bundled");
        output.insert(locator, local);
        Ok(())
      }
      Err(e) => match self.config.on_fetch_error {
        BundleFailurePolicy::Abort => Err(e),
        BundleFailurePolicy::FallbackToRemote => {
          warn!(locator = %locator, error = %e, "bundling failed, falling back to remote locator");
          output.fallbacks.push(locator.to_string());
          Ok(())
        }
      },
    }
  }

  async fn fetch_with_retry(&self, locator: &str) -> Result<Bytes, BundleError> {
    let policy = &self.config.fetch;
    let attempts = policy.attempts.max(1);
    let timeout = Duration::from_millis(policy.timeout_ms);
    let delay = Duration::from_millis(policy.delay_ms);

    let mut attempt = 1;
    loop {
      let result = match tokio::time::timeout(timeout, self.fetcher.fetch(locator, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
          ms: policy.timeout_ms,
        }),
      };

      match result {
        Ok(bytes) => return Ok(bytes),
        Err(e) => {
          warn!(locator = %locator, attempt, attempts, error = %e, "fetch attempt failed");
          if attempt >= attempts {
            return Err(BundleError::Fetch {
              locator: locator.to_string(),
              attempts,
              source: e,
            });
          }
        }
      }

      tokio::time::sleep(delay).await;
      attempt += 1;
    }
  }
}
