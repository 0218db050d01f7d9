//! Course API endpoints
//!
//! Public (optional auth):
//! - GET /api/v1/courses?q=&tag=&page=&per_page= - Ranked search over public courses
//! - GET /api/v1/courses/{id} - Course detail
//! - GET /api/v1/courses/{id}/lessons?skip=&limit= - Lessons by position
//!
//! Authenticated:
//! - POST /api/v1/courses, PUT/DELETE /api/v1/courses/{id}
//! - POST/DELETE /api/v1/courses/{id}/enroll, /api/v1/courses/{id}/favorite
//! - POST /api/v1/courses/{id}/lessons, PUT /api/v1/courses/{id}/lessons/order
//! - GET /api/v1/courses/{id}/collaborators, DELETE .../collaborators/{user_id}
//! - GET/POST /api/v1/courses/{id}/invitations, DELETE .../invitations/{email}
//! - POST /api/v1/invitations/accept?token=

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, PageResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::models::{
    CourseSearch, CourseWithTags, CreateCourseInput, CreateLessonInput, Lesson, LessonWindow,
    ListParams, PendingCollaborator, PublicProfile, UpdateCourseInput,
};
use crate::services::{CourseDetail, InviteOutcome};

/// Query parameters for course search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub tag: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl SearchQuery {
    fn search(&self) -> CourseSearch {
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        CourseSearch {
            query: non_empty(&self.q),
            tag: non_empty(&self.tag),
        }
    }
}

/// Query parameters for the lesson window
#[derive(Debug, Deserialize)]
pub struct LessonWindowQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_lesson_limit")]
    pub limit: i64,
}

fn default_lesson_limit() -> i64 {
    LessonWindow::default().limit
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub lesson_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptQuery {
    pub token: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(search_courses))
        .route("/courses/{id}", get(get_course))
        .route("/courses/{id}/lessons", get(list_lessons))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/courses", post(create_course))
        .route("/courses/{id}", put(update_course).delete(delete_course))
        .route("/courses/{id}/enroll", post(enroll).delete(unenroll))
        .route("/courses/{id}/favorite", post(add_favorite).delete(remove_favorite))
        .route("/courses/{id}/lessons", post(create_lesson))
        .route("/courses/{id}/lessons/order", put(reorder_lessons))
        .route("/courses/{id}/collaborators", get(list_collaborators))
        .route("/courses/{id}/collaborators/{user_id}", delete(remove_collaborator))
        .route("/courses/{id}/invitations", get(list_invitations).post(invite))
        .route("/courses/{id}/invitations/{email}", delete(revoke_invitation))
        .route("/invitations/accept", post(accept_invitation))
}

// ============================================================================
// Courses
// ============================================================================

/// GET /api/v1/courses
async fn search_courses(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PageResponse<CourseWithTags>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let result = state.course_service.search(&query.search(), &params).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/courses/{id}
async fn get_course(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.course_service.detail(id, viewer.user()).await?))
}

/// POST /api/v1/courses
async fn create_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCourseInput>,
) -> Result<impl IntoResponse, ApiError> {
    let course = state.course_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// PUT /api/v1/courses/{id}
async fn update_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCourseInput>,
) -> Result<Json<CourseWithTags>, ApiError> {
    Ok(Json(state.course_service.update(&user, id, body).await?))
}

/// DELETE /api/v1/courses/{id}
async fn delete_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Enrollment and favorites
// ============================================================================

/// POST /api/v1/courses/{id}/enroll
async fn enroll(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.enroll(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/courses/{id}/enroll
async fn unenroll(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.unenroll(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/courses/{id}/favorite
async fn add_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.add_favorite(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/courses/{id}/favorite
async fn remove_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.course_service.remove_favorite(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Lessons of a course
// ============================================================================

/// GET /api/v1/courses/{id}/lessons
async fn list_lessons(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
    Query(query): Query<LessonWindowQuery>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
    let window = LessonWindow {
        skip: query.skip,
        limit: query.limit,
    };
    Ok(Json(state.lesson_service.list(id, viewer.user(), window).await?))
}

/// POST /api/v1/courses/{id}/lessons
async fn create_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CreateLessonInput>,
) -> Result<impl IntoResponse, ApiError> {
    let lesson = state.lesson_service.create(&user, id, body).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// PUT /api/v1/courses/{id}/lessons/order
async fn reorder_lessons(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
    Ok(Json(state.lesson_service.reorder(&user, id, &body.lesson_ids).await?))
}

// ============================================================================
// Collaborators and invitations
// ============================================================================

/// GET /api/v1/courses/{id}/collaborators
async fn list_collaborators(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PublicProfile>>, ApiError> {
    Ok(Json(state.course_service.collaborators(&user, id).await?))
}

/// DELETE /api/v1/courses/{id}/collaborators/{user_id}
async fn remove_collaborator(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.course_service.remove_collaborator(&user, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/courses/{id}/invitations
async fn list_invitations(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PendingCollaborator>>, ApiError> {
    Ok(Json(state.invitation_service.list(&user, id).await?))
}

/// POST /api/v1/courses/{id}/invitations
async fn invite(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InviteOutcome>), ApiError> {
    let outcome = state.invitation_service.invite(&user, id, &body.email).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// DELETE /api/v1/courses/{id}/invitations/{email}
async fn revoke_invitation(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, email)): Path<(i64, String)>,
) -> Result<StatusCode, ApiError> {
    state.invitation_service.revoke(&user, id, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/invitations/accept?token=
async fn accept_invitation(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<AcceptQuery>,
) -> Result<Json<CourseWithTags>, ApiError> {
    Ok(Json(state.invitation_service.accept(&user, &query.token).await?))
}
