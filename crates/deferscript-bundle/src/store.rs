use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// A boxed stream of bytes for asset data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// Error type for asset storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Where bundled scripts are written.
///
/// Keys are flat asset names such as `3f2a9c0d1e4b5a67.js`.
#[async_trait]
pub trait AssetStore: Send + Sync {
  async fn put(&self, key: &str, data: ByteStream) -> Result<(), StoreError>;

  /// Whether `key` was already written, so unforced builds can skip it.
  async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Wrap an in-memory buffer as a single-chunk stream.
pub fn into_stream(bytes: Bytes) -> ByteStream {
  Box::pin(futures::stream::once(async move { Ok(bytes) }))
}
