//! HTTP Basic authentication against stored credentials.
//!
//! The middleware decodes the `Authorization` header, looks up the account
//! by login, compares the presented secret with the stored one, and attaches
//! the login as an [`AuthUser`] extension for attribution. Credential
//! derivation (hashing, rotation) is an upstream concern; the comparison
//! here is byte-wise against whatever registration stored.

use crate::{errors::AppError, state::AppState};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose};
use tracing::debug;

/// Login of the authenticated caller, injected into request extensions.
#[derive(Clone, Debug)]
pub struct AuthUser(pub String);

/// Require HTTP Basic credentials matching a registered user.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("missing credentials"))?;

    let (login, password) = decode_basic(header_value)
        .ok_or_else(|| AppError::unauthorized("malformed Authorization header"))?;

    let user = state
        .users
        .find_by_login(&login)
        .await?
        .ok_or_else(|| AppError::unauthorized("unknown login"))?;
    if user.password != password {
        debug!(login = %login, "credential mismatch");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    request.extensions_mut().insert(AuthUser(user.login));
    Ok(next.run(request).await)
}

/// Decode `Basic base64(login:password)` into its parts.
fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (login, password) = text.split_once(':')?;
    if login.is_empty() {
        return None;
    }
    Some((login.to_string(), password.to_string()))
}
