/// Blob Storage System
///
/// Durable storage for uploaded media (videos and thumbnails). The pipeline
/// only needs a public URL once the bytes are stored; the backend behind
/// [`BlobStore`] is swappable.

pub mod disk;
pub mod store;

pub use disk::DiskBlobBackend;
pub use store::BlobStore;

use crate::error::ReelResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Blob storage backend trait
///
/// Implementations handle the actual storage and retrieval of blob data.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a blob under `key`
    async fn put(&self, key: &str, data: Vec<u8>) -> ReelResult<()>;

    /// Retrieve a blob by key
    async fn get(&self, key: &str) -> ReelResult<Option<Vec<u8>>>;

    /// Delete a blob by key
    async fn delete(&self, key: &str) -> ReelResult<()>;

    /// Check if a blob exists
    async fn exists(&self, key: &str) -> ReelResult<bool>;

    /// Path of a key relative to the public media root
    fn public_path(&self, key: &str) -> String;
}

/// Configuration for blob storage
#[derive(Debug, Clone)]
pub struct BlobStorageConfig {
    /// Directory holding the blobs
    pub location: PathBuf,

    /// Maximum blob size in bytes
    pub max_blob_size: usize,

    /// Base URL the media directory is served under
    pub public_base_url: String,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from("./data/media"),
            max_blob_size: 512 * 1024 * 1024, // 512MB
            public_base_url: "http://localhost:3000/media".to_string(),
        }
    }
}

/// A stored blob and the URL it can be fetched from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
    pub size: usize,
    pub content_type: String,
}
