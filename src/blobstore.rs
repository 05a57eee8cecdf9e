//! Blob store client.
//!
//! The platform treats file storage as an opaque external service:
//! uploads yield a public URL plus an identifier used for deletion.
//! `HttpBlobStore` talks to the real provider; `MemoryBlobStore` backs
//! tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::storage::models::FileRef;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Blob store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Blob store rejected the request: {0}")]
    Rejected(String),
    #[error("Blob not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob, returning its public URL and opaque identifier.
    async fn store(&self, filename: &str, bytes: Vec<u8>) -> Result<FileRef, BlobStoreError>;

    /// Release a previously stored blob.
    async fn delete(&self, blob_id: &str) -> Result<(), BlobStoreError>;
}

// ============================================================================
// HTTP-backed store
// ============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
    url: String,
}

pub struct HttpBlobStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, BlobStoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn store(&self, filename: &str, bytes: Vec<u8>) -> Result<FileRef, BlobStoreError> {
        let url = format!("{}/upload", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("filename", filename)])
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BlobStoreError::Rejected(format!("{status}: {body}")));
        }

        let upload: UploadResponse = response.json().await?;
        tracing::debug!(blob_id = %upload.id, "Stored blob");
        Ok(FileRef {
            blob_id: upload.id,
            url: upload.url,
        })
    }

    async fn delete(&self, blob_id: &str) -> Result<(), BlobStoreError> {
        let url = format!("{}/blobs/{}", self.base_url, blob_id);
        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BlobStoreError::Rejected(status.to_string()));
        }

        tracing::debug!(blob_id = %blob_id, "Released blob");
        Ok(())
    }
}

// ============================================================================
// In-memory store (tests, local development)
// ============================================================================

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    counter: Mutex<u64>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a blob with the given id is currently stored.
    pub fn contains(&self, blob_id: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(blob_id)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, filename: &str, bytes: Vec<u8>) -> Result<FileRef, BlobStoreError> {
        let id = {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            format!("blob-{}", *counter)
        };
        self.blobs.lock().unwrap().insert(id.clone(), bytes);
        Ok(FileRef {
            url: format!("memory://{id}/{filename}"),
            blob_id: id,
        })
    }

    async fn delete(&self, blob_id: &str) -> Result<(), BlobStoreError> {
        match self.blobs.lock().unwrap().remove(blob_id) {
            Some(_) => Ok(()),
            None => Err(BlobStoreError::NotFound(blob_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryBlobStore::new();
        let file = store.store("notes.pdf", vec![1, 2, 3]).await.unwrap();
        assert!(store.contains(&file.blob_id));

        store.delete(&file.blob_id).await.unwrap();
        assert!(!store.contains(&file.blob_id));
    }

    #[tokio::test]
    async fn delete_missing_blob_fails() {
        let store = MemoryBlobStore::new();
        assert!(store.delete("nope").await.is_err());
    }
}
