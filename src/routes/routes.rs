//! Defines routes for file storage and account operations.
//!
//! ## Structure
//! - **File endpoints** (Basic auth required)
//!   - `POST   /api/files/upload` — encrypt and store a multipart upload
//!   - `GET    /api/files/download/bytes/{key}` — buffered decrypt-and-return
//!   - `GET    /api/files/download/file/{key}` — spooled, streamed download
//!   - `GET    /api/files/list` — object keys in blob-store order
//!   - `DELETE /api/files/{key}` — remove blob, then catalog record
//!
//! - **Account endpoints**
//!   - `POST   /api/users/register` — register
//!   - `GET    /api/users/{login}` — lookup by login
//!   - `DELETE /api/users/{id}` — remove account by numeric id
//!
//! Health endpoints (`/healthz`, `/readyz`) are unauthenticated.

use crate::{
    handlers::{
        auth::require_basic_auth,
        file_handlers::{
            delete_file, download_file_bytes, download_file_streamed, list_files, upload_file,
        },
        health_handlers::{healthz, readyz},
        user_handlers::{delete_user, get_user, register_user},
    },
    state::AppState,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Build the full application router over shared [`AppState`].
pub fn routes(state: AppState) -> Router {
    let files = Router::new()
        .route("/upload", post(upload_file))
        .route("/download/bytes/{key}", get(download_file_bytes))
        .route("/download/file/{key}", get(download_file_streamed))
        .route("/list", get(list_files))
        .route("/{key}", axum::routing::delete(delete_file))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    let users = Router::new()
        .route("/register", post(register_user))
        .route("/{login}", get(get_user).delete(delete_user));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api/files", files)
        .nest("/api/users", users)
        .with_state(state)
}
