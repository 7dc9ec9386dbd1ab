/// Disk-based blob storage backend
use crate::{
    blob_store::BlobBackend,
    error::{ReelError, ReelResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Stores blobs on the local filesystem with directory sharding on the
/// first two characters of the key.
#[derive(Clone)]
pub struct DiskBlobBackend {
    base_path: PathBuf,
}

impl DiskBlobBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn shard(key: &str) -> &str {
        key.get(0..2).unwrap_or("_")
    }

    /// {base}/{first2chars}/{key}
    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_path.join(Self::shard(key)).join(key)
    }
}

#[async_trait]
impl BlobBackend for DiskBlobBackend {
    async fn put(&self, key: &str, data: Vec<u8>) -> ReelResult<()> {
        let blob_path = self.blob_path(key);
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ReelError::Dependency(format!("Failed to create media directory: {}", e))
            })?;
        }

        // Write then rename so a reader never sees a partial file
        let partial = blob_path.with_extension("partial");
        fs::write(&partial, data)
            .await
            .map_err(|e| ReelError::Dependency(format!("Failed to write blob {}: {}", key, e)))?;
        fs::rename(&partial, &blob_path)
            .await
            .map_err(|e| ReelError::Dependency(format!("Failed to store blob {}: {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> ReelResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReelError::Dependency(format!(
                "Failed to read blob {}: {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> ReelResult<()> {
        match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReelError::Dependency(format!(
                "Failed to delete blob {}: {}",
                key, e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> ReelResult<bool> {
        Ok(fs::try_exists(self.blob_path(key)).await.unwrap_or(false))
    }

    fn public_path(&self, key: &str) -> String {
        format!("{}/{}", Self::shard(key), key)
    }
}
