//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and return it with its assigned id
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Case-insensitive lookup by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable field and bump `updated_at`
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user; owned courses, notes and sessions cascade
    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// Users ordered by id, with the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, role, avatar_url, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    username: String,
    password_hash: String,
    role: String,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            role: UserRole::from_str(&row.role)?,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = "INSERT INTO users (email, username, password_hash, role, avatar_url, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?, ?, ?)";
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(sql)
                .bind(&user.email)
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(user.role.to_string())
                .bind(&user.avatar_url)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to insert user")?
                .inserted_id()
        });

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by id")?
        });
        row.map(User::try_from).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let email = email.trim().to_lowercase();
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(&email)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by email")?
        });
        row.map(User::try_from).transpose()
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = "UPDATE users SET email = ?, username = ?, password_hash = ?, role = ?, avatar_url = ?, updated_at = ? \
                   WHERE id = ?";
        with_pool!(self.pool, |pool| {
            sqlx::query(sql)
                .bind(&user.email)
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(user.role.to_string())
                .bind(&user.avatar_url)
                .bind(now)
                .bind(user.id)
                .execute(pool)
                .await
                .context("Failed to update user")?
                .rows_affected()
        });

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete user")?
                .rows_affected()
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?
        });
        Ok(count)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let sql = format!("SELECT {} FROM users ORDER BY id LIMIT ? OFFSET ?", USER_COLUMNS);
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list users")?
        });
        let users = rows.into_iter().map(User::try_from).collect::<Result<Vec<_>>>()?;
        let total = self.count().await?;
        Ok((users, total))
    }
}
