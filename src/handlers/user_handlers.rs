//! Account registration and lookup handlers.

use crate::{errors::AppError, models::user::User, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub login: String,
    pub password: String,
}

/// `POST /api/users` — register an account.
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if request.login.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::bad_request("login and password are required"));
    }
    let user = state
        .users
        .register(request.login.trim(), &request.password)
        .await?;
    info!(login = %user.login, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/users/{login}` — fetch an account by login.
pub async fn get_user(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .find_by_login(&login)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no user with login `{}`", login)))?;
    Ok(Json(user))
}

/// `DELETE /api/users/{id}` — remove an account by numeric id.
///
/// Shares its path segment with the login lookup, so the id arrives as a
/// string and is parsed here.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::bad_request("user id must be numeric"))?;
    let removed = state.users.delete_by_id(id).await?;
    if removed == 0 {
        return Err(AppError::not_found(format!("no user with id {}", id)));
    }
    info!(id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
