//! Catalog record describing one stored (encrypted) object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata sidecar for a single object in the blob store.
///
/// A record exists if and only if a live blob exists under `object_key`;
/// it is created only after a successful blob write and deleted only after
/// the corresponding blob delete.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct FileRecord {
    /// Store-assigned identifier (monotonic, never reused).
    pub id: i64,

    /// Blob-store namespace the object lives in.
    pub bucket_name: String,

    /// Original client-supplied name. Not unique.
    pub file_name: String,

    /// The exact key used to address the object in the blob store.
    /// Unique across all records.
    pub object_key: String,

    /// Plaintext size in bytes, recorded at write time.
    pub file_size: Option<i64>,

    /// Login of the uploader, when the request carried one.
    pub uploaded_by: Option<String>,

    /// Timestamp of the successful blob write.
    pub uploaded_at: DateTime<Utc>,
}

/// Insert shape for [`FileRecord`]; the backend assigns `id`.
#[derive(Clone, Debug)]
pub struct NewFileRecord {
    pub bucket_name: String,
    pub file_name: String,
    pub object_key: String,
    pub file_size: Option<i64>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}
