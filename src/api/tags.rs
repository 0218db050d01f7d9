//! Tag API endpoints
//!
//! - GET /api/v1/tags - All tags with course counts
//! - DELETE /api/v1/tags/{id} - Delete a tag (admin)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::TagWithCount;

pub fn public_router() -> Router<AppState> {
    Router::new().route("/tags", get(list_tags))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/tags/{id}", delete(delete_tag))
}

/// GET /api/v1/tags
async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithCount>>, ApiError> {
    Ok(Json(state.tag_service.list().await?))
}

/// DELETE /api/v1/tags/{id}
async fn delete_tag(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.tag_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
