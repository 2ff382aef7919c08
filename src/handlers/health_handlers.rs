//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks metadata-store connectivity and
//!   a blob-store write/read/delete probe

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against the metadata store (`SELECT 1`).
/// 2. Performs a best-effort put/get/delete probe against the blob store.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    // 1) metadata store check
    let metadata_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(v) if v == 1 => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    // 2) blob store probe under a throwaway key
    let probe_key = format!(".readyz-{}", Uuid::new_v4());
    let blob_check = match state
        .blob_store
        .put(&state.bucket, &probe_key, Bytes::from_static(b"readyz"))
        .await
    {
        Ok(_) => match state.blob_store.get_bytes(&state.bucket, &probe_key).await {
            Ok(bytes) if bytes.as_ref() == b"readyz" => {
                match state.blob_store.delete(&state.bucket, &probe_key).await {
                    Ok(_) => (true, None::<String>),
                    Err(e) => (true, Some(format!("could not remove probe object: {}", e))),
                }
            }
            Ok(_) => {
                let _ = state.blob_store.delete(&state.bucket, &probe_key).await;
                (false, Some("probe content mismatch".to_string()))
            }
            Err(e) => {
                let _ = state.blob_store.delete(&state.bucket, &probe_key).await;
                (false, Some(format!("could not read probe object: {}", e)))
            }
        },
        Err(e) => (false, Some(format!("could not write probe object: {}", e))),
    };

    let metadata_ok = metadata_check.0;
    let blob_ok = blob_check.0;
    let overall_ok = metadata_ok && blob_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "metadata",
        CheckStatus {
            ok: metadata_ok,
            error: metadata_check.1,
        },
    );
    checks.insert(
        "blob_store",
        CheckStatus {
            ok: blob_ok,
            error: blob_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
