//! Pending collaborator repository

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::PendingCollaborator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Invitation repository trait
#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Insert the invitation, or refresh inviter and expiry if the
    /// (course, email) pair is already pending
    async fn upsert(&self, invitation: &PendingCollaborator) -> Result<PendingCollaborator>;

    async fn get(&self, course_id: i64, email: &str) -> Result<Option<PendingCollaborator>>;

    async fn list_for_course(&self, course_id: i64) -> Result<Vec<PendingCollaborator>>;

    /// Returns false when nothing was pending for the pair
    async fn delete(&self, course_id: i64, email: &str) -> Result<bool>;

    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based invitation repository implementation
pub struct SqlxInvitationRepository {
    pool: DynDatabasePool,
}

impl SqlxInvitationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn InvitationRepository> {
        Arc::new(Self::new(pool))
    }
}

const INVITATION_COLUMNS: &str = "id, course_id, email, invited_by, created_at, expires_at";

#[derive(sqlx::FromRow)]
struct InvitationRow {
    id: i64,
    course_id: i64,
    email: String,
    invited_by: i64,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<InvitationRow> for PendingCollaborator {
    fn from(row: InvitationRow) -> Self {
        PendingCollaborator {
            id: row.id,
            course_id: row.course_id,
            email: row.email,
            invited_by: row.invited_by,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait]
impl InvitationRepository for SqlxInvitationRepository {
    async fn upsert(&self, invitation: &PendingCollaborator) -> Result<PendingCollaborator> {
        let now = Utc::now();
        if let Some(existing) = self.get(invitation.course_id, &invitation.email).await? {
            with_pool!(self.pool, |pool| {
                sqlx::query(
                    "UPDATE pending_collaborators SET invited_by = ?, created_at = ?, expires_at = ? WHERE id = ?",
                )
                .bind(invitation.invited_by)
                .bind(now)
                .bind(invitation.expires_at)
                .bind(existing.id)
                .execute(pool)
                .await
                .context("Failed to refresh invitation")?
                .rows_affected()
            });
            return Ok(PendingCollaborator {
                id: existing.id,
                created_at: now,
                ..invitation.clone()
            });
        }

        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO pending_collaborators (course_id, email, invited_by, created_at, expires_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(invitation.course_id)
            .bind(&invitation.email)
            .bind(invitation.invited_by)
            .bind(now)
            .bind(invitation.expires_at)
            .execute(pool)
            .await
            .context("Failed to insert invitation")?
            .inserted_id()
        });
        Ok(PendingCollaborator {
            id,
            created_at: now,
            ..invitation.clone()
        })
    }

    async fn get(&self, course_id: i64, email: &str) -> Result<Option<PendingCollaborator>> {
        let sql = format!(
            "SELECT {} FROM pending_collaborators WHERE course_id = ? AND email = ?",
            INVITATION_COLUMNS
        );
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, InvitationRow>(&sql)
                .bind(course_id)
                .bind(email)
                .fetch_optional(pool)
                .await
                .context("Failed to get invitation")?
        });
        Ok(row.map(PendingCollaborator::from))
    }

    async fn list_for_course(&self, course_id: i64) -> Result<Vec<PendingCollaborator>> {
        let sql = format!(
            "SELECT {} FROM pending_collaborators WHERE course_id = ? ORDER BY created_at DESC, id DESC",
            INVITATION_COLUMNS
        );
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, InvitationRow>(&sql)
                .bind(course_id)
                .fetch_all(pool)
                .await
                .context("Failed to list invitations")?
        });
        Ok(rows.into_iter().map(PendingCollaborator::from).collect())
    }

    async fn delete(&self, course_id: i64, email: &str) -> Result<bool> {
        let removed = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM pending_collaborators WHERE course_id = ? AND email = ?")
                .bind(course_id)
                .bind(email)
                .execute(pool)
                .await
                .context("Failed to delete invitation")?
                .rows_affected()
        });
        Ok(removed > 0)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let removed = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM pending_collaborators WHERE expires_at < ?")
                .bind(Utc::now())
                .execute(pool)
                .await
                .context("Failed to delete expired invitations")?
                .rows_affected()
        });
        Ok(removed)
    }
}
