//! User API endpoints
//!
//! - GET /api/v1/users - List users (admin)
//! - GET /api/v1/users/{id} - Public profile
//! - PUT /api/v1/users/{id} - Update own account (or any, as admin)
//! - DELETE /api/v1/users/{id} - Delete own account (or any, as admin)
//! - GET /api/v1/me/{courses,enrollments,favorites,notes} - The caller's own lists

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::models::{CourseWithTags, PublicProfile, UpdateUserInput, User};
use crate::services::NoteView;

/// Query parameters for listing my notes
#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    pub lesson_id: Option<i64>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/users/{id}", get(get_profile))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", axum::routing::put(update_user).delete(delete_user))
        .route("/me/courses", get(my_courses))
        .route("/me/enrollments", get(my_enrollments))
        .route("/me/favorites", get(my_favorites))
        .route("/me/notes", get(my_notes))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

/// GET /api/v1/users - List users (admin)
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<User>>, ApiError> {
    let result = state.user_service.list(&query.params()).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/users/{id} - Public profile; the email is shown to the owner and admins
async fn get_profile(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<PublicProfile>, ApiError> {
    let user = state.user_service.get_by_id(id).await?;
    let show_email = viewer.user().is_some_and(|v| v.can_manage_account(id));
    Ok(Json(PublicProfile::from_user(&user, show_email)))
}

/// PUT /api/v1/users/{id}
async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    let user = state.user_service.update(&actor, id, body).await?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/me/courses - Courses I created
async fn my_courses(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<CourseWithTags>>, ApiError> {
    Ok(Json(state.course_service.created_by(&user).await?))
}

/// GET /api/v1/me/enrollments
async fn my_enrollments(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<CourseWithTags>>, ApiError> {
    Ok(Json(state.course_service.enrolled_in(&user).await?))
}

/// GET /api/v1/me/favorites
async fn my_favorites(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<CourseWithTags>>, ApiError> {
    Ok(Json(state.course_service.favorites(&user).await?))
}

/// GET /api/v1/me/notes?lesson_id=
async fn my_notes(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<NotesQuery>,
) -> Result<Json<Vec<NoteView>>, ApiError> {
    Ok(Json(state.note_service.list_mine(&user, query.lesson_id).await?))
}
