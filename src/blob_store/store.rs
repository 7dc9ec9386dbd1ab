/// Content-addressed media store
use crate::{
    blob_store::{disk::DiskBlobBackend, BlobBackend, BlobStorageConfig, StoredBlob},
    error::{ReelError, ReelResult},
    metrics,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Accepted upload types and the extension they are stored with
const ACCEPTED_TYPES: &[(&str, &str)] = &[
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("video/quicktime", "mov"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

#[derive(Clone)]
pub struct BlobStore {
    config: BlobStorageConfig,
    backend: Arc<dyn BlobBackend>,
}

impl BlobStore {
    /// Disk-backed store at the configured location
    pub fn new(config: BlobStorageConfig) -> Self {
        let backend = Arc::new(DiskBlobBackend::new(config.location.clone()));
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: BlobStorageConfig, backend: Arc<dyn BlobBackend>) -> Self {
        Self { config, backend }
    }

    pub fn max_blob_size(&self) -> usize {
        self.config.max_blob_size
    }

    /// Store bytes under their SHA-256 and return the public URL.
    /// Uploading identical bytes twice yields the same URL.
    pub async fn put(&self, data: Vec<u8>, content_type: &str) -> ReelResult<StoredBlob> {
        if data.is_empty() {
            return Err(ReelError::Validation("Upload is empty".to_string()));
        }
        if data.len() > self.config.max_blob_size {
            return Err(ReelError::Validation(format!(
                "Upload exceeds the {} byte limit",
                self.config.max_blob_size
            )));
        }

        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let extension = ACCEPTED_TYPES
            .iter()
            .find(|(accepted, _)| *accepted == content_type)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| {
                ReelError::Validation(format!("Unsupported media type: {}", content_type))
            })?;

        let key = format!("{}.{}", hex::encode(Sha256::digest(&data)), extension);
        let size = data.len();

        if self.backend.exists(&key).await? {
            tracing::debug!("Blob {} already stored", key);
        } else {
            self.backend.put(&key, data).await?;
            tracing::info!("Stored blob {} ({} bytes)", key, size);
        }
        metrics::record_media_upload(&content_type);

        Ok(StoredBlob {
            url: self.url_for(&key),
            key,
            size,
            content_type,
        })
    }

    pub async fn get(&self, key: &str) -> ReelResult<Option<Vec<u8>>> {
        self.backend.get(key).await
    }

    pub async fn delete(&self, key: &str) -> ReelResult<()> {
        self.backend.delete(key).await
    }

    pub fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            self.backend.public_path(key)
        )
    }
}
