//! User service
//!
//! Registration, login and token authentication, plus profile management.
//!
//! - The first account ever registered becomes an admin.
//! - Login creates a server-side session and returns an access token that
//!   names it, so logging out (deleting the session) revokes the token even
//!   before it expires.

use crate::cache::{CacheLayer, MemoryCache};
use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, ListParams, PagedResult, Session, UpdateUserInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{AccessClaims, TokenSigner, ACCESS_TOKEN_SALT};
use crate::services::validation::{
    normalize_email, validate_password, validate_url, validate_username, FieldError,
};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("{0}")]
    ValidationError(#[from] FieldError),

    /// Wrong email or password; deliberately uniform
    #[error("Incorrect email or password")]
    AuthenticationError,

    #[error("{0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// A verified access token
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub session_id: String,
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    /// Deleting an account cascades to its courses
    cache: Arc<MemoryCache>,
    signer: TokenSigner,
    token_ttl: Duration,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        cache: Arc<MemoryCache>,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            cache,
            signer: TokenSigner::new(&auth.jwt_secret, ACCESS_TOKEN_SALT),
            token_ttl: Duration::hours(auth.token_ttl_hours),
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a bad email, username or weak password
    /// - `UserExists` if the email is already registered (case-insensitive)
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email)?;
        let username = validate_username(&input.username)?;
        validate_password(&input.password)?;

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists("Email already registered".to_string()));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Student
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let created = self
            .user_repo
            .create(&User::new(email, username, password_hash, role))
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check credentials, open a session and issue an access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to get user by email")?
            .ok_or(UserServiceError::AuthenticationError)?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(UserServiceError::AuthenticationError);
        }

        let session = self
            .session_repo
            .create(&Session::new(user.id, self.token_ttl))
            .await
            .context("Failed to create session")?;

        let claims = AccessClaims {
            sub: user.id,
            sid: session.id.clone(),
            role: user.role.to_string(),
            iat: session.created_at.timestamp(),
            exp: session.expires_at.timestamp(),
        };
        let token = self
            .signer
            .sign(&claims)
            .map_err(|e| anyhow::anyhow!("Failed to sign access token: {}", e))?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome {
            token,
            token_type: "Bearer",
            expires_at: session.expires_at,
            user,
        })
    }

    /// Resolve an access token to its user.
    ///
    /// Returns `None` when the signature is wrong, the token has expired, the
    /// session was logged out or the user no longer exists.
    pub async fn authenticate(&self, token: &str) -> Result<Option<Authenticated>, UserServiceError> {
        let claims: AccessClaims = match self.signer.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Rejected access token: {}", e);
                return Ok(None);
            }
        };

        let session = match self
            .session_repo
            .get_by_id(&claims.sid)
            .await
            .context("Failed to get session")?
        {
            Some(session) if session.user_id == claims.sub => session,
            _ => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(&session.id).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.map(|user| Authenticated {
            user,
            session_id: session.id,
        }))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to get user by email")?)
    }

    /// Apply profile changes. Only the account owner or an admin may do this.
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        if !actor.can_manage_account(id) {
            return Err(UserServiceError::Forbidden(
                "You can only modify your own account".to_string(),
            ));
        }
        let mut user = self.get_by_id(id).await?;

        if let Some(email) = input.email {
            let email = normalize_email(&email)?;
            if email != user.email {
                if self
                    .user_repo
                    .get_by_email(&email)
                    .await
                    .context("Failed to check email")?
                    .is_some()
                {
                    return Err(UserServiceError::UserExists("Email already registered".to_string()));
                }
                user.email = email;
            }
        }
        if let Some(username) = input.username {
            user.username = validate_username(&username)?;
        }
        if let Some(password) = input.password {
            validate_password(&password)?;
            user.password_hash = hash_password(&password).context("Failed to hash password")?;
        }
        if input.avatar_url.is_some() {
            user.avatar_url = validate_url("avatar_url", input.avatar_url)?;
        }

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }

    /// Delete an account and everything it owns.
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), UserServiceError> {
        if !actor.can_manage_account(id) {
            return Err(UserServiceError::Forbidden(
                "You can only delete your own account".to_string(),
            ));
        }
        self.get_by_id(id).await?;
        self.user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;
        let _ = self.cache.delete_pattern("course:*").await;

        tracing::info!(user_id = id, actor_id = actor.id, "User deleted");
        Ok(())
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self
            .user_repo
            .list(params)
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete all expired sessions, returning how many went
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }
}
