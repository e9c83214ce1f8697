use crate::errors::AccountError;
use crate::models::{FetchQuery, FetchResponse};
use crate::routes::AppState;
use crate::services::account_service;
use axum::extract::{Query, State};
use axum::Json;
use std::sync::Arc;

/// Fetch an allowlisted URL on the caller's behalf.
///
/// GET /fetch?url=...
pub async fn fetch_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchQuery>,
) -> Result<Json<FetchResponse>, AccountError> {
    let result = account_service::fetch(&state.gatekeeper, &query.url).await?;
    Ok(Json(FetchResponse::from(result)))
}
