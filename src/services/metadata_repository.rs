//! Metadata-store capability: the durable catalog of stored objects.
//!
//! One row per live blob, keyed by a store-assigned id and addressed by
//! `object_key` (unique) or `file_name` (not unique). The orchestrator is
//! the only writer; this module owns durability and the uniqueness
//! constraint.

use crate::models::file_record::{FileRecord, NewFileRecord};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("a record for object key `{0}` already exists")]
    DuplicateObjectKey(String),
    #[error("metadata backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for MetadataError {
    fn from(err: sqlx::Error) -> Self {
        MetadataError::Backend(err.to_string())
    }
}

/// Catalog capability over per-file records.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Persist a new record; the backend assigns the id.
    async fn save(&self, record: NewFileRecord) -> Result<FileRecord, MetadataError>;
    async fn find_by_object_key(
        &self,
        object_key: &str,
    ) -> Result<Option<FileRecord>, MetadataError>;
    async fn find_by_file_name(
        &self,
        file_name: &str,
    ) -> Result<Option<FileRecord>, MetadataError>;
    /// Remove the record addressed by its object key. Returns rows removed.
    async fn delete_by_object_key(&self, object_key: &str) -> Result<u64, MetadataError>;
    /// Bulk-remove every record sharing an original file name. Returns rows
    /// removed.
    async fn delete_by_file_name(&self, file_name: &str) -> Result<u64, MetadataError>;
}

/// SQLite-backed catalog.
#[derive(Clone)]
pub struct SqliteMetadataRepository {
    db: Arc<SqlitePool>,
}

impl SqliteMetadataRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

/// Return true if the SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    async fn save(&self, record: NewFileRecord) -> Result<FileRecord, MetadataError> {
        sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO file_records (
                bucket_name, file_name, object_key, file_size, uploaded_by, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, bucket_name, file_name, object_key, file_size, uploaded_by, uploaded_at
            "#,
        )
        .bind(&record.bucket_name)
        .bind(&record.file_name)
        .bind(&record.object_key)
        .bind(record.file_size)
        .bind(&record.uploaded_by)
        .bind(record.uploaded_at)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                MetadataError::DuplicateObjectKey(record.object_key.clone())
            } else {
                MetadataError::from(err)
            }
        })
    }

    async fn find_by_object_key(
        &self,
        object_key: &str,
    ) -> Result<Option<FileRecord>, MetadataError> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, bucket_name, file_name, object_key, file_size, uploaded_by, uploaded_at
             FROM file_records WHERE object_key = ?",
        )
        .bind(object_key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn find_by_file_name(
        &self,
        file_name: &str,
    ) -> Result<Option<FileRecord>, MetadataError> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, bucket_name, file_name, object_key, file_size, uploaded_by, uploaded_at
             FROM file_records WHERE file_name = ? ORDER BY id LIMIT 1",
        )
        .bind(file_name)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn delete_by_object_key(&self, object_key: &str) -> Result<u64, MetadataError> {
        let result = sqlx::query("DELETE FROM file_records WHERE object_key = ?")
            .bind(object_key)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_file_name(&self, file_name: &str) -> Result<u64, MetadataError> {
        let result = sqlx::query("DELETE FROM file_records WHERE file_name = ?")
            .bind(file_name)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repository() -> SqliteMetadataRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::query(
            "CREATE TABLE file_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bucket_name TEXT NOT NULL,
                file_name TEXT NOT NULL,
                object_key TEXT NOT NULL UNIQUE,
                file_size INTEGER,
                uploaded_by TEXT,
                uploaded_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .expect("schema");
        SqliteMetadataRepository::new(Arc::new(pool))
    }

    fn new_record(object_key: &str, file_name: &str) -> NewFileRecord {
        NewFileRecord {
            bucket_name: "files".into(),
            file_name: file_name.into(),
            object_key: object_key.into(),
            file_size: Some(42),
            uploaded_by: Some("dzmitry".into()),
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_assigns_monotonic_ids() {
        let repo = repository().await;
        let first = repo.save(new_record("k1_a.txt", "a.txt")).await.unwrap();
        let second = repo.save(new_record("k2_a.txt", "a.txt")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn object_key_is_unique() {
        let repo = repository().await;
        repo.save(new_record("k1_a.txt", "a.txt")).await.unwrap();
        let err = repo.save(new_record("k1_a.txt", "other.txt")).await;
        assert!(matches!(err, Err(MetadataError::DuplicateObjectKey(_))));
    }

    #[tokio::test]
    async fn finds_by_key_and_by_name() {
        let repo = repository().await;
        let saved = repo.save(new_record("k1_a.txt", "a.txt")).await.unwrap();

        let by_key = repo.find_by_object_key("k1_a.txt").await.unwrap().unwrap();
        assert_eq!(by_key.id, saved.id);
        assert_eq!(by_key.object_key, "k1_a.txt");

        let by_name = repo.find_by_file_name("a.txt").await.unwrap().unwrap();
        assert_eq!(by_name.id, saved.id);
        assert!(repo.find_by_object_key("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_object_key_removes_one_row() {
        let repo = repository().await;
        repo.save(new_record("k1_a.txt", "a.txt")).await.unwrap();
        repo.save(new_record("k2_a.txt", "a.txt")).await.unwrap();
        assert_eq!(repo.delete_by_object_key("k1_a.txt").await.unwrap(), 1);
        assert_eq!(repo.delete_by_object_key("k1_a.txt").await.unwrap(), 0);
        assert!(repo.find_by_object_key("k2_a.txt").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_by_file_name_removes_all_matches() {
        let repo = repository().await;
        repo.save(new_record("k1_a.txt", "a.txt")).await.unwrap();
        repo.save(new_record("k2_a.txt", "a.txt")).await.unwrap();
        repo.save(new_record("k3_b.txt", "b.txt")).await.unwrap();
        assert_eq!(repo.delete_by_file_name("a.txt").await.unwrap(), 2);
        assert!(repo.find_by_file_name("a.txt").await.unwrap().is_none());
        assert!(repo.find_by_file_name("b.txt").await.unwrap().is_some());
    }
}
