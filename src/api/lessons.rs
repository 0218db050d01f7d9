//! Lesson and note API endpoints
//!
//! - GET /api/v1/lessons/{id} - Lesson with rendered content (optional auth)
//! - PUT /api/v1/lessons/{id} - Update (creator or collaborator)
//! - DELETE /api/v1/lessons/{id} - Delete (creator only)
//! - GET/POST /api/v1/lessons/{id}/notes - My notes on a lesson
//! - GET/PUT/DELETE /api/v1/notes/{id} - One of my notes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::models::{Lesson, NoteInput, UpdateLessonInput};
use crate::services::{LessonView, NoteView};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/lessons/{id}", get(get_lesson))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/lessons/{id}", put(update_lesson).delete(delete_lesson))
        .route("/lessons/{id}/notes", get(list_notes).post(create_note))
        .route("/notes/{id}", get(get_note).put(update_note).delete(delete_note))
}

/// GET /api/v1/lessons/{id}
async fn get_lesson(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<LessonView>, ApiError> {
    Ok(Json(state.lesson_service.get(id, viewer.user()).await?))
}

/// PUT /api/v1/lessons/{id}
async fn update_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateLessonInput>,
) -> Result<Json<Lesson>, ApiError> {
    Ok(Json(state.lesson_service.update(&user, id, body).await?))
}

/// DELETE /api/v1/lessons/{id}
async fn delete_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.lesson_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/lessons/{id}/notes
async fn list_notes(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<NoteView>>, ApiError> {
    Ok(Json(state.note_service.list_mine(&user, Some(id)).await?))
}

/// POST /api/v1/lessons/{id}/notes
async fn create_note(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<NoteInput>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.note_service.create(&user, id, body).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /api/v1/notes/{id}
async fn get_note(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<NoteView>, ApiError> {
    Ok(Json(state.note_service.get(&user, id).await?))
}

/// PUT /api/v1/notes/{id}
async fn update_note(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<NoteInput>,
) -> Result<Json<NoteView>, ApiError> {
    Ok(Json(state.note_service.update(&user, id, body).await?))
}

/// DELETE /api/v1/notes/{id}
async fn delete_note(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.note_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
