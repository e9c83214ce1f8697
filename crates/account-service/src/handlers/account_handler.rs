use crate::errors::AccountError;
use crate::models::{AccountSummary, LoginRequest, LoginResponse, RegisterRequest, UserResponse};
use crate::routes::AppState;
use crate::services::account_service::{self, RegistrationRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use common::secret::ExposeSecret;
use std::sync::Arc;

/// Handle registration
///
/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountSummary>), AccountError> {
    let summary = account_service::register(
        &state.pool,
        &state.hasher,
        RegistrationRequest {
            username: payload.username,
            secret: payload.password,
            email: payload.email,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// Handle login
///
/// POST /login
///
/// The token, when present, comes from configuration only.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AccountError> {
    let user = account_service::authenticate(
        &state.pool,
        &state.hasher,
        &payload.username,
        &payload.password,
    )
    .await?;

    let token = state
        .config
        .login_token
        .as_ref()
        .map(|token| token.expose_secret().to_string());

    Ok(Json(LoginResponse {
        message: "Login successful",
        user,
        token,
    }))
}

/// Handle user lookup
///
/// GET /users/:username
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AccountError> {
    let user = account_service::lookup(&state.pool, &username).await?;
    Ok(Json(UserResponse { user }))
}
