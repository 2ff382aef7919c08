//! Persistent entities for the encrypted file storage service.
//!
//! These map to SQLite tables via `sqlx::FromRow` and serialize as JSON via
//! `serde`. They describe catalog state only; object bytes live in the blob
//! store and never pass through these types.

pub mod file_record;
pub mod user;
