//! Blob-store capability: named byte objects inside a fixed bucket.
//!
//! The trait is the narrow surface the orchestrator composes over; the
//! filesystem adapter stores payloads sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}` so no single directory grows
//! unbounded. No retries happen here; callers pick transient-vs-permanent
//! handling from the error kind.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Remote content-store capability: put/get/delete/list of named byte
/// objects within a bucket. Keys are opaque strings, unique per bucket.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), BlobStoreError>;
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Bytes, BlobStoreError>;
    async fn get_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, BlobStoreError>;
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError>;
    async fn list(&self, bucket: &str) -> Result<Vec<String>, BlobStoreError>;
}

/// Filesystem-backed blob store.
#[derive(Clone)]
pub struct FsBlobStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty or oversized keys, keys containing `..` or a path
    /// separator, and keys carrying control bytes.
    fn ensure_key_safe(key: &str) -> Result<(), BlobStoreError> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(BlobStoreError::InvalidKey);
        }
        if key.contains('/') || key.contains("..") {
            return Err(BlobStoreError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(BlobStoreError::InvalidKey);
        }
        Ok(())
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(bucket/key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00-ff).
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.bucket_root(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn not_found(bucket: &str, key: &str) -> BlobStoreError {
        BlobStoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Recursively remove empty shard directories up to the bucket root.
    ///
    /// Stops at the first non-empty or missing directory.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    /// Write bytes to a temporary file, fsync, and atomically rename into
    /// the final location. Overwrites an existing object under the same key.
    async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), BlobStoreError> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(bucket, key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| BlobStoreError::Io(io::Error::other("object path missing parent")))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        let write_result = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobStoreError::Io(err));
            }
        }
        debug!("stored blob {} ({} bytes)", file_path.display(), bytes.len());
        Ok(())
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Bytes, BlobStoreError> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(bucket, key);
        fs::read(&file_path).await.map(Bytes::from).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                Self::not_found(bucket, key)
            } else {
                BlobStoreError::Io(err)
            }
        })
    }

    async fn get_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, BlobStoreError> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(bucket, key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                Self::not_found(bucket, key)
            } else {
                BlobStoreError::Io(err)
            }
        })?;
        Ok(Box::new(file))
    }

    /// Remove an object; absent keys are an error so callers can distinguish
    /// a no-op delete from a real one.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(bucket, key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed blob {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Self::not_found(bucket, key));
            }
            Err(err) => return Err(BlobStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }
        Ok(())
    }

    /// Enumerate object keys in the store's native (directory walk) order.
    /// A missing bucket directory lists as empty.
    async fn list(&self, bucket: &str) -> Result<Vec<String>, BlobStoreError> {
        let root = self.bucket_root(bucket);
        let mut keys = Vec::new();
        let mut outer = match fs::read_dir(&root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(err) => return Err(BlobStoreError::Io(err)),
        };
        while let Some(shard_a) = outer.next_entry().await? {
            if !shard_a.file_type().await?.is_dir() {
                continue;
            }
            let mut mid = fs::read_dir(shard_a.path()).await?;
            while let Some(shard_b) = mid.next_entry().await? {
                if !shard_b.file_type().await?.is_dir() {
                    continue;
                }
                let mut leaf = fs::read_dir(shard_b.path()).await?;
                while let Some(entry) = leaf.next_entry().await? {
                    if !entry.file_type().await?.is_file() {
                        continue;
                    }
                    if let Some(name) = entry.file_name().to_str() {
                        // skip interrupted writes
                        if !name.starts_with(".tmp-") {
                            keys.push(name.to_string());
                        }
                    }
                }
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let (_dir, store) = store();
        store
            .put("files", "abc_report.pdf", Bytes::from_static(b"cipherbytes"))
            .await
            .unwrap();
        let bytes = store.get_bytes("files", "abc_report.pdf").await.unwrap();
        assert_eq!(bytes.as_ref(), b"cipherbytes");
    }

    #[tokio::test]
    async fn get_reader_streams_full_payload() {
        let (_dir, store) = store();
        store
            .put("files", "streamed.bin", Bytes::from_static(b"0123456789"))
            .await
            .unwrap();
        let mut reader = store.get_reader("files", "streamed.bin").await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"0123456789");
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let (_dir, store) = store();
        store
            .put("files", "same-key", Bytes::from_static(b"old"))
            .await
            .unwrap();
        store
            .put("files", "same-key", Bytes::from_static(b"new"))
            .await
            .unwrap();
        let bytes = store.get_bytes("files", "same-key").await.unwrap();
        assert_eq!(bytes.as_ref(), b"new");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.get_bytes("files", "nope").await,
            Err(BlobStoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("files", "nope").await,
            Err(BlobStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_object_and_prunes_shards() {
        let (dir, store) = store();
        store
            .put("files", "victim", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.delete("files", "victim").await.unwrap();
        assert!(matches!(
            store.get_bytes("files", "victim").await,
            Err(BlobStoreError::NotFound { .. })
        ));
        // shard directories are pruned back to the bucket root
        let bucket_root = dir.path().join("files");
        let remaining = std::fs::read_dir(&bucket_root)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn list_enumerates_keys_and_empty_bucket() {
        let (_dir, store) = store();
        assert!(store.list("files").await.unwrap().is_empty());
        store
            .put("files", "k1", Bytes::from_static(b"a"))
            .await
            .unwrap();
        store
            .put("files", "k2", Bytes::from_static(b"b"))
            .await
            .unwrap();
        let mut keys = store.list("files").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);
    }

    #[tokio::test]
    async fn unsafe_keys_are_rejected() {
        let (_dir, store) = store();
        for key in ["", "/abs", "up/../and-over", "nested/key", "nul\0byte"] {
            assert!(
                matches!(
                    store.put("files", key, Bytes::from_static(b"x")).await,
                    Err(BlobStoreError::InvalidKey)
                ),
                "key {:?} should be rejected",
                key
            );
        }
    }
}
