//! src/services/storage_service.rs
//!
//! FileStorageService — the encrypted blob storage pipeline. Composes the
//! key service, blob store, and metadata repository into upload / download /
//! list / delete operations with unique object-key generation.
//!
//! Consistency rule: the catalog record's `object_key` is always the exact
//! string used for the blob-store put, and a record is written only after
//! the blob write succeeds. The one partial-failure window left open is a
//! metadata write failing after a successful blob write; that surfaces as
//! [`StorageError::MetadataInconsistency`] and leaves an orphaned blob for
//! out-of-band reconciliation. There is no distributed transaction across
//! the two stores.

use crate::models::file_record::NewFileRecord;
use crate::services::blob_store::{BlobStore, BlobStoreError};
use crate::services::key_service::KeyService;
use crate::services::metadata_repository::{MetadataError, MetadataRepository};
use bytes::Bytes;
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Caller-fault input: unreadable payload or an unusable file name.
    #[error("invalid input: {0}")]
    Input(String),
    /// The requested object key addresses nothing in the blob store.
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    /// A remote dependency failed mid-operation; nothing was recorded about
    /// the attempt beyond logs.
    #[error("{service} failure during {operation} of `{key}`: {source}")]
    Upstream {
        service: &'static str,
        operation: &'static str,
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Blob store and catalog disagree: the blob operation succeeded but the
    /// matching metadata write failed.
    #[error("metadata out of step with blob store for `{key}`: {source}")]
    MetadataInconsistency { key: String, source: MetadataError },
    /// Local scratch I/O failed (spool file for a download handle).
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Plaintext download spooled to a caller-owned scratch file.
///
/// The handle either points at fully written decrypted content or was never
/// returned. Dropping it removes the backing file; [`DownloadHandle::open`]
/// unlinks the path after opening so the returned descriptor outlives it.
#[derive(Debug)]
pub struct DownloadHandle {
    path: PathBuf,
    size: u64,
}

impl DownloadHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Open the spooled plaintext for reading and unlink the backing path.
    pub async fn open(self) -> io::Result<File> {
        let file = File::open(&self.path).await?;
        let _ = fs::remove_file(&self.path).await;
        Ok(file)
    }
}

impl Drop for DownloadHandle {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// The file storage orchestrator.
///
/// Holds no mutable state across requests; the bucket name and active key id
/// are resolved once at startup and immutable thereafter. Remote
/// capabilities are dyn-dispatched so tests substitute in-memory fakes.
#[derive(Clone)]
pub struct FileStorageService {
    key_service: Arc<dyn KeyService>,
    blob_store: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataRepository>,
    bucket: String,
    key_id: String,
    spool_dir: PathBuf,
}

impl FileStorageService {
    pub fn new(
        key_service: Arc<dyn KeyService>,
        blob_store: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataRepository>,
        bucket: impl Into<String>,
        key_id: impl Into<String>,
        spool_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key_service,
            blob_store,
            metadata,
            bucket: bucket.into(),
            key_id: key_id.into(),
            spool_dir: spool_dir.into(),
        }
    }

    /// Reject names that would not survive as the suffix of an object key.
    ///
    /// Object keys are `{token}_{name}`, so the name must be free of path
    /// separators and control bytes.
    fn ensure_file_name_safe(name: &str) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::Input("file name must not be empty".into()));
        }
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(StorageError::Input(format!(
                "file name exceeds {} bytes",
                MAX_FILE_NAME_LEN
            )));
        }
        if name.contains('/') || name.contains("..") {
            return Err(StorageError::Input(
                "file name must not contain path segments".into(),
            ));
        }
        if name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::Input(
                "file name must not contain control characters".into(),
            ));
        }
        Ok(())
    }

    fn upstream(
        service: &'static str,
        operation: &'static str,
        key: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> StorageError {
        error!(
            service,
            operation,
            object_key = %key,
            cause = %source,
            "upstream dependency failed"
        );
        StorageError::Upstream {
            service,
            operation,
            key: key.to_string(),
            source: Box::new(source),
        }
    }

    /// Encrypt a payload and store it under a freshly generated object key,
    /// then record the catalog entry. Returns the object key the caller uses
    /// for later retrieval.
    pub async fn upload(
        &self,
        payload: &[u8],
        original_name: &str,
        uploaded_by: Option<&str>,
    ) -> StorageResult<String> {
        Self::ensure_file_name_safe(original_name)?;

        // Random token plus the original name: collision-free but still
        // human-readable when listed.
        let token = Uuid::new_v4();
        let object_key = format!("{}_{}", token, original_name);
        debug!(object_key = %object_key, size = payload.len(), "starting upload");

        let ciphertext = self
            .key_service
            .encrypt(&self.key_id, payload)
            .await
            .map_err(|err| Self::upstream("key-service", "encrypt", &object_key, err))?;

        self.blob_store
            .put(&self.bucket, &object_key, Bytes::from(ciphertext))
            .await
            .map_err(|err| match err {
                BlobStoreError::InvalidKey => {
                    StorageError::Input("object key rejected by blob store".into())
                }
                other => Self::upstream("blob-store", "put", &object_key, other),
            })?;

        let record = NewFileRecord {
            bucket_name: self.bucket.clone(),
            file_name: original_name.to_string(),
            object_key: object_key.clone(),
            file_size: Some(payload.len() as i64),
            uploaded_by: uploaded_by.map(str::to_string),
            uploaded_at: Utc::now(),
        };
        match self.metadata.save(record).await {
            Ok(saved) => {
                info!(
                    id = saved.id,
                    object_key = %object_key,
                    size = payload.len(),
                    "upload complete"
                );
                Ok(object_key)
            }
            Err(err) => {
                // The blob landed but the catalog write did not: an orphaned
                // blob until out-of-band reconciliation picks it up.
                error!(
                    object_key = %object_key,
                    bucket = %self.bucket,
                    cause = %err,
                    "blob stored but metadata write failed"
                );
                Err(StorageError::MetadataInconsistency {
                    key: object_key,
                    source: err,
                })
            }
        }
    }

    /// Fetch and decrypt an object. The catalog is not consulted; the blob
    /// store is the source of truth for existence of bytes.
    pub async fn download_bytes(&self, object_key: &str) -> StorageResult<Vec<u8>> {
        let ciphertext = self
            .blob_store
            .get_bytes(&self.bucket, object_key)
            .await
            .map_err(|err| match err {
                BlobStoreError::NotFound { bucket, key } => StorageError::NotFound { bucket, key },
                BlobStoreError::InvalidKey => StorageError::Input("malformed object key".into()),
                other => Self::upstream("blob-store", "get", object_key, other),
            })?;

        let plaintext = self
            .key_service
            .decrypt(&ciphertext)
            .await
            .map_err(|err| Self::upstream("key-service", "decrypt", object_key, err))?;
        debug!(object_key = %object_key, size = plaintext.len(), "download complete");
        Ok(plaintext)
    }

    /// Fetch and decrypt an object into a scratch file the caller owns.
    pub async fn download_to_handle(&self, object_key: &str) -> StorageResult<DownloadHandle> {
        let plaintext = self.download_bytes(object_key).await?;

        fs::create_dir_all(&self.spool_dir).await?;
        let spool_path = self.spool_dir.join(format!("download-{}", Uuid::new_v4()));
        let handle = DownloadHandle {
            path: spool_path.clone(),
            size: plaintext.len() as u64,
        };

        // From here the handle owns the path: any early return drops it and
        // removes whatever was written.
        let mut file = File::create(&spool_path).await?;
        file.write_all(&plaintext).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(handle)
    }

    /// Enumerate object keys in the bucket, in the blob store's native
    /// listing order. Each call re-enumerates from scratch.
    pub async fn list_files(&self) -> StorageResult<Vec<String>> {
        self.blob_store
            .list(&self.bucket)
            .await
            .map_err(|err| Self::upstream("blob-store", "list", "*", err))
    }

    /// Delete an object and its catalog record, blob first.
    ///
    /// A blob-store failure leaves the catalog untouched so metadata is
    /// never removed for bytes that still exist.
    pub async fn delete(&self, object_key: &str) -> StorageResult<()> {
        self.blob_store
            .delete(&self.bucket, object_key)
            .await
            .map_err(|err| match err {
                BlobStoreError::NotFound { bucket, key } => StorageError::NotFound { bucket, key },
                BlobStoreError::InvalidKey => StorageError::Input("malformed object key".into()),
                other => Self::upstream("blob-store", "delete", object_key, other),
            })?;

        match self.metadata.delete_by_object_key(object_key).await {
            Ok(0) => {
                // Blob existed without a record: a pre-existing orphan this
                // delete happened to clean up.
                warn!(object_key = %object_key, "deleted blob had no catalog record");
                Ok(())
            }
            Ok(_) => {
                info!(object_key = %object_key, "delete complete");
                Ok(())
            }
            Err(err) => {
                error!(
                    object_key = %object_key,
                    cause = %err,
                    "blob deleted but metadata removal failed"
                );
                Err(StorageError::MetadataInconsistency {
                    key: object_key.to_string(),
                    source: err,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_with_path_segments_are_rejected() {
        for name in ["", "a/b.txt", "../up.txt", "nul\0.txt", "tab\t.txt"] {
            assert!(
                FileStorageService::ensure_file_name_safe(name).is_err(),
                "name {:?} should be rejected",
                name
            );
        }
        for name in ["report.pdf", "empty.txt", "x", "spaced name.txt", ".hidden"] {
            assert!(
                FileStorageService::ensure_file_name_safe(name).is_ok(),
                "name {:?} should be accepted",
                name
            );
        }
    }

    #[test]
    fn oversized_file_name_is_rejected() {
        let long = "a".repeat(MAX_FILE_NAME_LEN + 1);
        assert!(FileStorageService::ensure_file_name_safe(&long).is_err());
        let ok = "a".repeat(MAX_FILE_NAME_LEN);
        assert!(FileStorageService::ensure_file_name_safe(&ok).is_ok());
    }
}
