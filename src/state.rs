//! Shared application state carried by the router.

use crate::services::blob_store::BlobStore;
use crate::services::storage_service::FileStorageService;
use crate::services::user_repository::SqliteUserRepository;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// The encrypted storage pipeline.
    pub storage: FileStorageService,

    /// Stored-credential lookup for Basic auth and attribution.
    pub users: SqliteUserRepository,

    /// Metadata pool, used directly by the readiness probe.
    pub db: Arc<SqlitePool>,

    /// Raw blob store handle for the readiness probe; request traffic goes
    /// through `storage`.
    pub blob_store: Arc<dyn BlobStore>,

    /// Bucket the deployment serves.
    pub bucket: String,
}
