use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::store::{AssetStore, ByteStream, StoreError};

/// Filesystem-based asset store.
///
/// Each asset is stored at `{base_path}/{key}`. Writes go to a temporary
/// sibling first and are renamed into place, so a failed build never leaves
/// a truncated script behind.
pub struct FsAssetStore {
  base_path: PathBuf,
}

impl FsAssetStore {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  fn key_to_path(&self, key: &str) -> PathBuf {
    self.base_path.join(key)
  }
}

#[async_trait]
impl AssetStore for FsAssetStore {
  async fn put(&self, key: &str, data: ByteStream) -> Result<(), StoreError> {
    let path = self.key_to_path(key);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let partial = path.with_extension("partial");
    let mut file = File::create(&partial).await?;
    let mut stream = std::pin::pin!(data);

    while let Some(chunk) = stream.next().await {
      let bytes = chunk?;
      file.write_all(&bytes).await?;
    }

    file.flush().await?;
    drop(file);
    fs::rename(&partial, &path).await?;
    Ok(())
  }

  async fn exists(&self, key: &str) -> Result<bool, StoreError> {
    Ok(fs::try_exists(self.key_to_path(key)).await?)
  }
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;
  use futures::stream;

  use super::*;
  use crate::store::into_stream;

  #[tokio::test]
  async fn test_put_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsAssetStore::new(dir.path().join("scripts"));

    store
      .put("a.js", into_stream(Bytes::from_static(b"console.log(1)")))
      .await
      .unwrap();

    assert!(store.exists("a.js").await.unwrap());
    let written = std::fs::read(dir.path().join("scripts/a.js")).unwrap();
    assert_eq!(written, b"console.log(1)");
    assert!(!dir.path().join("scripts/a.partial").exists());
  }

  #[tokio::test]
  async fn test_missing_asset() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsAssetStore::new(dir.path());

    assert!(!store.exists("nope.js").await.unwrap());
  }

  #[tokio::test]
  async fn test_failed_stream_leaves_no_asset() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsAssetStore::new(dir.path());
    let data: ByteStream = Box::pin(stream::iter(vec![
      Ok(Bytes::from_static(b"partial")),
      Err(StoreError::Io(std::io::Error::other("connection reset"))),
    ]));

    assert!(store.put("b.js", data).await.is_err());
    assert!(!store.exists("b.js").await.unwrap());
  }
}
