use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::FetchError;

/// Downloads a remote script.
#[async_trait]
pub trait Fetcher: Send + Sync {
  /// Fetch `locator` once. Retry policy is applied by the caller.
  async fn fetch(&self, locator: &str, timeout: Duration) -> Result<Bytes, FetchError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("deferscript/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self { client })
  }

  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, locator: &str, timeout: Duration) -> Result<Bytes, FetchError> {
    debug!(locator = %locator, timeout_ms = timeout.as_millis() as u64, "fetching script");

    let response = self
      .client
      .get(locator)
      .timeout(timeout)
      .send()
      .await
      .map_err(|e| classify(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        status: status.as_u16(),
      });
    }

    response.bytes().await.map_err(|e| classify(e, timeout))
  }
}

fn classify(e: reqwest::Error, timeout: Duration) -> FetchError {
  if e.is_timeout() {
    FetchError::Timeout {
      ms: timeout.as_millis() as u64,
    }
  } else {
    FetchError::Transport(e.to_string())
  }
}
