//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Auth and user endpoints
//! - Category and tag endpoints
//! - Course, enrollment, favorite, collaborator and invitation endpoints
//! - Lesson and note endpoints
//!
//! Routes are grouped by access level. Public routes run with optional
//! authentication so handlers can tailor visibility to the caller.

pub mod auth;
pub mod categories;
pub mod common;
pub mod courses;
pub mod lessons;
pub mod middleware;
pub mod tags;
pub mod users;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCourseRepository, SqlxInvitationRepository, SqlxLessonRepository,
    SqlxNoteRepository, SqlxSessionRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    CategoryService, CourseService, EmailService, InvitationService, LessonService, NoteService,
    RateLimiter, TagService, UserService,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, CurrentSession, OptionalUser};

/// Wire repositories, cache and services into the shared application state
pub fn build_state(pool: DynDatabasePool, config: &Config) -> AppState {
    let cache = create_cache(&config.cache);

    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let category_repo = SqlxCategoryRepository::boxed(pool.clone());
    let tag_repo = SqlxTagRepository::boxed(pool.clone());
    let course_repo = SqlxCourseRepository::boxed(pool.clone());
    let lesson_repo = SqlxLessonRepository::boxed(pool.clone());
    let note_repo = SqlxNoteRepository::boxed(pool.clone());
    let invitation_repo = SqlxInvitationRepository::boxed(pool);

    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        session_repo,
        cache.clone(),
        &config.auth,
    ));
    let category_service = Arc::new(CategoryService::new(category_repo.clone(), cache.clone()));
    let tag_service = Arc::new(TagService::new(tag_repo, cache.clone()));
    let course_service = Arc::new(CourseService::new(
        course_repo,
        lesson_repo.clone(),
        user_repo.clone(),
        category_repo,
        tag_service.clone(),
        cache,
    ));
    let lesson_service = Arc::new(LessonService::new(lesson_repo, course_service.clone()));
    let note_service = Arc::new(NoteService::new(note_repo, lesson_service.clone()));
    let invitation_service = Arc::new(InvitationService::new(
        invitation_repo,
        user_repo,
        course_service.clone(),
        Arc::new(EmailService::new(config.email.clone())),
        &config.auth,
        &config.server.public_url,
    ));

    AppState {
        user_service,
        category_service,
        tag_service,
        course_service,
        lesson_service,
        note_service,
        invitation_service,
        rate_limiter: RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_seconds),
        ),
        session_max_age_secs: config.auth.token_ttl_hours * 3600,
    }
}

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .merge(users::admin_router())
        .merge(categories::admin_router())
        .merge(tags::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(users::protected_router())
        .merge(courses::protected_router())
        .merge(lessons::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Login is the only rate limited route
    let login_routes = auth::login_router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::rate_limit_login,
    ));

    // Public routes
    Router::new()
        .merge(auth::public_router())
        .merge(users::public_router())
        .merge(categories::public_router())
        .merge(tags::public_router())
        .merge(courses::public_router())
        .merge(lessons::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
        .merge(login_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let cors = if cors_origin == "*" {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new()
            .allow_origin(
                cors_origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?,
            )
            .allow_credentials(true)
    }
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use axum::http::{HeaderName, StatusCode};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    async fn server_with(config: Config) -> TestServer {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let state = build_state(pool, &config);
        let router = build_router(state, &config.server.cors_origin).expect("router builds");
        TestServer::new(router).expect("test server starts")
    }

    async fn server() -> TestServer {
        server_with(Config::default()).await
    }

    /// Register and log in; returns the bearer token.
    async fn sign_up(server: &TestServer, email: &str) -> String {
        server
            .post("/api/v1/auth/register")
            .json(&json!({ "email": email, "username": "user", "password": "Str0ng!pass" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": email, "password": "Str0ng!pass" }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"]
            .as_str()
            .expect("login returns a token")
            .to_string()
    }

    async fn create_course(server: &TestServer, token: &str, body: Value) -> i64 {
        let response = server
            .post("/api/v1/courses")
            .authorization_bearer(token)
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().expect("course id")
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_case_insensitively() {
        let server = server().await;
        sign_up(&server, "alice@example.com").await;

        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({ "email": "ALICE@Example.com", "username": "alice2", "password": "Str0ng!pass" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "DUPLICATE");
    }

    #[tokio::test]
    async fn test_validation_error_names_field() {
        let server = server().await;
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({ "email": "not-an-email", "username": "bob", "password": "Str0ng!pass" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "email");
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let server = server().await;
        let token = sign_up(&server, "alice@example.com").await;

        server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await
            .assert_status_ok();
        server
            .post("/api/v1/auth/logout")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_only_creator_or_admin_can_modify_course() {
        let server = server().await;
        let admin = sign_up(&server, "admin@example.com").await;
        let owner = sign_up(&server, "owner@example.com").await;
        let other = sign_up(&server, "other@example.com").await;
        let id = create_course(&server, &owner, json!({ "title": "Rust", "status": "public" })).await;
        let path = format!("/api/v1/courses/{}", id);

        server
            .put(&path)
            .authorization_bearer(&other)
            .json(&json!({ "title": "Mine now" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&path)
            .authorization_bearer(&other)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        server
            .put(&path)
            .authorization_bearer(&admin)
            .json(&json!({ "title": "Rust (edited)" }))
            .await
            .assert_status_ok();
        server
            .delete(&path)
            .authorization_bearer(&admin)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deleted_owner_takes_cached_course_along() {
        let server = server().await;
        let _admin = sign_up(&server, "admin@example.com").await;
        let owner = sign_up(&server, "owner@example.com").await;
        let student = sign_up(&server, "student@example.com").await;
        let id = create_course(&server, &owner, json!({ "title": "Rust", "status": "public" })).await;
        let path = format!("/api/v1/courses/{}", id);

        // Warm the course cache
        server.get(&path).await.assert_status_ok();

        let owner_id = server
            .get("/api/v1/auth/me")
            .authorization_bearer(&owner)
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();
        server
            .delete(&format!("/api/v1/users/{}", owner_id))
            .authorization_bearer(&owner)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
        server
            .post(&format!("{}/enroll", path))
            .authorization_bearer(&student)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deleted_tag_leaves_cached_course() {
        let server = server().await;
        let admin = sign_up(&server, "admin@example.com").await;
        let id = create_course(
            &server,
            &admin,
            json!({ "title": "Rust", "status": "public", "tags": ["systems"] }),
        )
        .await;
        let path = format!("/api/v1/courses/{}", id);

        let detail = server.get(&path).await.json::<Value>();
        let tag_id = detail["tags"][0]["id"].as_i64().unwrap();

        server
            .delete(&format!("/api/v1/tags/{}", tag_id))
            .authorization_bearer(&admin)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let detail = server.get(&path).await.json::<Value>();
        assert_eq!(detail["tags"], json!([]));
    }

    #[tokio::test]
    async fn test_draft_course_hidden_from_anonymous() {
        let server = server().await;
        let owner = sign_up(&server, "owner@example.com").await;
        let id = create_course(&server, &owner, json!({ "title": "Secret" })).await;
        let path = format!("/api/v1/courses/{}", id);

        server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
        let response = server.get(&path).authorization_bearer(&owner).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["viewer"]["can_manage"], true);
    }

    #[tokio::test]
    async fn test_enroll_twice_rejected() {
        let server = server().await;
        let owner = sign_up(&server, "owner@example.com").await;
        let student = sign_up(&server, "student@example.com").await;
        let id = create_course(&server, &owner, json!({ "title": "Rust", "status": "public" })).await;
        let path = format!("/api/v1/courses/{}/enroll", id);

        server
            .post(&path)
            .authorization_bearer(&student)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let response = server.post(&path).authorization_bearer(&student).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["message"], "Already enrolled");

        let enrollments = server
            .get("/api/v1/me/enrollments")
            .authorization_bearer(&student)
            .await
            .json::<Value>();
        assert_eq!(enrollments.as_array().map(Vec::len), Some(1));

        let detail = server.get(&format!("/api/v1/courses/{}", id)).await.json::<Value>();
        assert_eq!(detail["student_count"], 1);
    }

    #[tokio::test]
    async fn test_search_ranking_and_visibility() {
        let server = server().await;
        let owner = sign_up(&server, "owner@example.com").await;
        create_course(
            &server,
            &owner,
            json!({ "title": "Cooking", "description": "Learn rust removal", "status": "public" }),
        )
        .await;
        create_course(
            &server,
            &owner,
            json!({ "title": "Systems", "status": "public", "tags": ["Rust"] }),
        )
        .await;
        create_course(&server, &owner, json!({ "title": "Rust Basics", "status": "public" })).await;
        create_course(&server, &owner, json!({ "title": "Rust Drafts" })).await;

        let response = server
            .get("/api/v1/courses")
            .add_query_param("q", "rust")
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        let titles: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Rust Basics", "Systems", "Cooking"]);
        assert_eq!(body["total"], 3);
        assert_eq!(body["total_pages"], 1);
    }

    #[tokio::test]
    async fn test_reorder_lessons() {
        let server = server().await;
        let owner = sign_up(&server, "owner@example.com").await;
        let course = create_course(&server, &owner, json!({ "title": "Rust", "status": "public" })).await;
        let lessons_path = format!("/api/v1/courses/{}/lessons", course);

        let mut ids = Vec::new();
        for title in ["One", "Two", "Three"] {
            let response = server
                .post(&lessons_path)
                .authorization_bearer(&owner)
                .json(&json!({ "title": title }))
                .await;
            response.assert_status(StatusCode::CREATED);
            ids.push(response.json::<Value>()["id"].as_i64().unwrap());
        }

        let order_path = format!("{}/order", lessons_path);
        server
            .put(&order_path)
            .authorization_bearer(&owner)
            .json(&json!({ "lesson_ids": [ids[0], ids[1]] }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let listed = server.get(&lessons_path).await.json::<Value>();
        let order: Vec<i64> = listed.as_array().unwrap().iter().map(|l| l["id"].as_i64().unwrap()).collect();
        assert_eq!(order, ids);

        let response = server
            .put(&order_path)
            .authorization_bearer(&owner)
            .json(&json!({ "lesson_ids": [ids[2], ids[0], ids[1]] }))
            .await;
        response.assert_status_ok();
        let reordered = response.json::<Value>();
        assert_eq!(reordered[0]["id"], ids[2]);
        assert_eq!(reordered[0]["position"], 1);
        assert_eq!(reordered[2]["position"], 3);
    }

    #[tokio::test]
    async fn test_invitation_flow() {
        let server = server().await;
        let owner = sign_up(&server, "owner@example.com").await;
        let invitee = sign_up(&server, "invitee@example.com").await;
        let intruder = sign_up(&server, "intruder@example.com").await;
        let course = create_course(&server, &owner, json!({ "title": "Rust" })).await;

        let response = server
            .post(&format!("/api/v1/courses/{}/invitations", course))
            .authorization_bearer(&owner)
            .json(&json!({ "email": "Invitee@Example.com" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

        server
            .post("/api/v1/invitations/accept")
            .add_query_param("token", &token)
            .authorization_bearer(&intruder)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/api/v1/invitations/accept")
            .add_query_param("token", format!("{}x", token))
            .authorization_bearer(&invitee)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/v1/invitations/accept")
            .add_query_param("token", &token)
            .authorization_bearer(&invitee)
            .await
            .assert_status_ok();

        // The invitee now edits the draft course
        server
            .post(&format!("/api/v1/courses/{}/lessons", course))
            .authorization_bearer(&invitee)
            .json(&json!({ "title": "Intro" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_notes_are_private() {
        let server = server().await;
        let owner = sign_up(&server, "owner@example.com").await;
        let other = sign_up(&server, "other@example.com").await;
        let course = create_course(&server, &owner, json!({ "title": "Rust", "status": "public" })).await;
        let lesson = server
            .post(&format!("/api/v1/courses/{}/lessons", course))
            .authorization_bearer(&owner)
            .json(&json!({ "title": "Intro" }))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        let response = server
            .post(&format!("/api/v1/lessons/{}/notes", lesson))
            .authorization_bearer(&owner)
            .json(&json!({ "content": "**key** point" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let note = response.json::<Value>();
        assert!(note["content_html"].as_str().unwrap().contains("<strong>key</strong>"));

        let path = format!("/api/v1/notes/{}", note["id"]);
        server
            .get(&path)
            .authorization_bearer(&other)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get("/api/v1/notes/9999")
            .authorization_bearer(&owner)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin() {
        let server = server().await;
        let admin = sign_up(&server, "admin@example.com").await;
        let user = sign_up(&server, "user@example.com").await;

        server
            .post("/api/v1/categories")
            .json(&json!({ "name": "Science" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/v1/categories")
            .authorization_bearer(&user)
            .json(&json!({ "name": "Science" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/api/v1/categories")
            .authorization_bearer(&admin)
            .json(&json!({ "name": "Science" }))
            .await
            .assert_status(StatusCode::CREATED);

        let categories = server.get("/api/v1/categories").await.json::<Value>();
        assert_eq!(categories[0]["name"], "Science");
    }

    #[tokio::test]
    async fn test_login_rate_limited_per_ip() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 3;
        let server = server_with(config).await;
        let forwarded = HeaderName::from_static("x-forwarded-for");
        let attempt = |ip: &'static str| {
            server
                .post("/api/v1/auth/login")
                .add_header(forwarded.clone(), HeaderValue::from_static(ip))
                .json(&json!({ "email": "nobody@example.com", "password": "wrong" }))
        };

        for _ in 0..3 {
            attempt("1.2.3.4").await.assert_status(StatusCode::UNAUTHORIZED);
        }
        let limited = attempt("1.2.3.4").await;
        limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().get(header::RETRY_AFTER).is_some());

        // Other clients are unaffected
        attempt("5.6.7.8").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}
