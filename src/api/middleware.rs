//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and the mapping from service errors into it
//! - Authentication (bearer token or `session` cookie) and admin checks
//! - Per-IP rate limiting for the login endpoint

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::models::User;
use crate::services::{
    CategoryService, CategoryServiceError, CourseService, CourseServiceError, FieldError,
    InvitationService, InvitationServiceError, LessonService, LessonServiceError, NoteService,
    NoteServiceError, RateLimiter, TagService, TagServiceError, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub course_service: Arc<CourseService>,
    pub lesson_service: Arc<LessonService>,
    pub note_service: Arc<NoteService>,
    pub invitation_service: Arc<InvitationService>,
    pub rate_limiter: RateLimiter,
    /// Lifetime of the session cookie set on login
    pub session_max_age_secs: i64,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Session behind the access token of the current request
#[derive(Debug, Clone)]
pub struct CurrentSession(pub String);

/// The signed-in user, if any, on routes open to everyone
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl OptionalUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

// ============================================================================
// Error envelope
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new("DUPLICATE", message)
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self::with_details(
            "RATE_LIMITED",
            "Too many requests. Please try again later.",
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    /// Log the underlying error and hide it from the client.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" | "DUPLICATE" | "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self
            .error
            .details
            .as_ref()
            .and_then(|d| d.get("retry_after"))
            .and_then(|v| v.as_u64());

        let mut response = (status, Json(self)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        ApiError::with_details(
            "VALIDATION_ERROR",
            err.message,
            serde_json::json!({ "field": err.field }),
        )
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(e) => e.into(),
            UserServiceError::AuthenticationError => ApiError::unauthorized(err.to_string()),
            UserServiceError::UserExists(msg) => ApiError::duplicate(msg),
            UserServiceError::NotFound => ApiError::not_found(err.to_string()),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::ValidationError(e) => e.into(),
            CategoryServiceError::DuplicateName(_) => ApiError::duplicate(err.to_string()),
            CategoryServiceError::NotFound => ApiError::not_found(err.to_string()),
            CategoryServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(e) => e.into(),
            TagServiceError::NotFound => ApiError::not_found(err.to_string()),
            TagServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::ValidationError(e) => e.into(),
            CourseServiceError::NotFound | CourseServiceError::NotCollaborator => {
                ApiError::not_found(err.to_string())
            }
            CourseServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CourseServiceError::DuplicateTitle { .. } => ApiError::duplicate(err.to_string()),
            CourseServiceError::AlreadyEnrolled
            | CourseServiceError::NotEnrolled
            | CourseServiceError::NotOpenForEnrollment => ApiError::bad_request(err.to_string()),
            CourseServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<LessonServiceError> for ApiError {
    fn from(err: LessonServiceError) -> Self {
        match err {
            LessonServiceError::ValidationError(e) => e.into(),
            LessonServiceError::NotFound => ApiError::not_found(err.to_string()),
            LessonServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            LessonServiceError::PositionTaken(_) => ApiError::with_details(
                "DUPLICATE",
                err.to_string(),
                serde_json::json!({ "field": "position" }),
            ),
            LessonServiceError::InvalidOrder(msg) => ApiError::bad_request(msg),
            LessonServiceError::Course(e) => e.into(),
            LessonServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<NoteServiceError> for ApiError {
    fn from(err: NoteServiceError) -> Self {
        match err {
            NoteServiceError::ValidationError(e) => e.into(),
            NoteServiceError::NotFound => ApiError::not_found(err.to_string()),
            NoteServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            NoteServiceError::Lesson(e) => e.into(),
            NoteServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<InvitationServiceError> for ApiError {
    fn from(err: InvitationServiceError) -> Self {
        match err {
            InvitationServiceError::ValidationError(e) => e.into(),
            InvitationServiceError::InvalidToken | InvitationServiceError::AlreadyMember(_) => {
                ApiError::bad_request(err.to_string())
            }
            InvitationServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            InvitationServiceError::NotFound => ApiError::not_found(err.to_string()),
            InvitationServiceError::Course(e) => e.into(),
            InvitationServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

// ============================================================================
// Extractors
// ============================================================================

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract the access token from the `Authorization` header or the
/// `session` cookie; the header wins when both are present.
fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

async fn attach_user(state: &AppState, request: &mut Request) -> Result<bool, ApiError> {
    let Some(token) = extract_session_token(request.headers()) else {
        return Ok(false);
    };
    let Some(auth) = state.user_service.authenticate(&token).await? else {
        return Ok(false);
    };
    request.extensions_mut().insert(AuthenticatedUser(auth.user));
    request.extensions_mut().insert(CurrentSession(auth.session_id));
    Ok(true)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !attach_user(&state, &mut request).await? {
        return Err(ApiError::unauthorized("Invalid or missing access token"));
    }
    Ok(next.run(request).await)
}

/// Optional authentication middleware; a bad token is treated as anonymous
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Err(e) = attach_user(&state, &mut request).await {
        tracing::warn!("Optional authentication failed: {}", e.error.message);
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Rate limiting
// ============================================================================

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// socket peer address.
pub fn extract_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return ip.to_string();
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Login rate limiting middleware
pub async fn rate_limit_login(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = extract_ip(request.headers(), peer);

    if !state.rate_limiter.check(&ip).await {
        let retry_after = state.rate_limiter.retry_after(&ip).await.max(1);
        tracing::warn!(%ip, retry_after, "Login rate limit exceeded");
        return Err(ApiError::rate_limited(retry_after));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Tests
// ============================================================================
