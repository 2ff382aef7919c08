//! Stored client credentials, looked up by login during request handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered client account.
///
/// The stored credential is opaque to this service; credential derivation
/// (hashing, rotation) happens upstream of registration.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct User {
    /// Store-assigned identifier.
    pub id: i64,

    /// Login key, unique across all users.
    pub login: String,

    /// Opaque stored credential. Never serialized into responses.
    #[serde(skip_serializing)]
    pub password: String,

    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}
