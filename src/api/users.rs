use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use std::sync::Arc;

use super::types::{
    DeleteParams, Envelope, LoginRequest, RegisterRequest, UpdateUserRequest, UserDto,
};
use super::{ApiError, AppState};

/// POST /users
/// Register an account; the optional `secretKey` unlocks the admin role.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Envelope>, ApiError> {
    state
        .accounts
        .register(
            &payload.username,
            &payload.password,
            payload.secret_key.as_deref(),
        )
        .await?;

    Ok(Json(Envelope::success("user registered")))
}

/// POST /users/login
/// The success envelope carries the bearer token in `message`.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let token = state
        .accounts
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(Envelope::success(token)))
}

/// GET /users
/// Admin only; returns the raw account array rather than the envelope.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    let claims = state.accounts.authenticate(&headers).await?;
    let users = state.accounts.list_users(&claims).await?;

    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

/// PATCH /users
/// Self-service for regular accounts; admins may target any id.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let claims = state.accounts.authenticate(&headers).await?;

    state
        .accounts
        .update_user(
            &claims,
            payload.id,
            payload.username.as_deref(),
            payload.password.as_deref(),
        )
        .await?;

    Ok(Json(Envelope::success("user updated")))
}

/// DELETE /users?id=N
/// Admin only.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Envelope>, ApiError> {
    let claims = state.accounts.authenticate(&headers).await?;

    let id = params
        .id
        .ok_or_else(|| ApiError::bad_request("url param 'id' is missing"))?;
    let id: i32 = id
        .parse()
        .map_err(|_| ApiError::bad_request("url param 'id' must be an integer"))?;

    state.accounts.delete_user(&claims, id).await?;

    Ok(Json(Envelope::success("user deleted")))
}
