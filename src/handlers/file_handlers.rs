//! HTTP handlers for the file storage operations.
//!
//! Uploads arrive as multipart form data (field `file`); downloads leave as
//! octet-stream bodies, either buffered or streamed from a spooled scratch
//! file. Storage concerns live in `FileStorageService`; handlers translate
//! between HTTP and the pipeline.

use crate::{
    errors::AppError,
    handlers::auth::AuthUser,
    state::AppState,
};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub object_key: String,
    pub file_name: String,
    pub file_size: usize,
}

/// `POST /api/files/upload` — encrypt and store a multipart upload.
///
/// Reads the first `file` field; a body that cannot be read is the caller's
/// fault and maps to 400 without touching any remote dependency.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(AuthUser(login)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("unreadable multipart body: {}", err)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("file field carries no filename"))?;
        let payload = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("unreadable file data: {}", err)))?;

        info!(file_name = %file_name, uploaded_by = %login, "received upload request");
        let object_key = state
            .storage
            .upload(&payload, &file_name, Some(&login))
            .await?;

        let body = UploadResponse {
            object_key,
            file_name,
            file_size: payload.len(),
        };
        return Ok((StatusCode::CREATED, Json(body)));
    }

    Err(AppError::bad_request("multipart body has no `file` field"))
}

/// `GET /api/files/download/bytes/{key}` — fetch, decrypt, and return the
/// whole payload in one response body.
pub async fn download_file_bytes(
    State(state): State<AppState>,
    Path(object_key): Path<String>,
) -> Result<Response, AppError> {
    let plaintext = state.storage.download_bytes(&object_key).await?;

    let mut response = Response::new(Body::from(plaintext));
    set_download_headers(response.headers_mut(), &object_key);
    Ok(response)
}

/// `GET /api/files/download/file/{key}` — fetch and decrypt into a scratch
/// file, then stream it out. The scratch file is unlinked once opened, so it
/// is released whether or not the client reads to the end.
pub async fn download_file_streamed(
    State(state): State<AppState>,
    Path(object_key): Path<String>,
) -> Result<Response, AppError> {
    let handle = state.storage.download_to_handle(&object_key).await?;
    let size = handle.size();
    let file = handle
        .open()
        .await
        .map_err(|err| AppError::internal(format!("spool file vanished: {}", err)))?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    set_download_headers(response.headers_mut(), &object_key);
    if let Ok(value) = HeaderValue::from_str(&size.to_string()) {
        response.headers_mut().insert(header::CONTENT_LENGTH, value);
    }
    Ok(response)
}

/// `GET /api/files/list` — object keys in the bucket, blob-store order.
pub async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let keys = state.storage.list_files().await?;
    Ok(Json(keys))
}

/// `DELETE /api/files/{key}` — remove blob and catalog record.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(object_key): Path<String>,
) -> Result<StatusCode, AppError> {
    state.storage.delete(&object_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Octet-stream plus attachment disposition carrying the object key.
fn set_download_headers(headers: &mut HeaderMap, object_key: &str) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    let disposition = format!("attachment; filename=\"{}\"", object_key.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}
