//! Collaborator invitations
//!
//! Inviting stages a pending row and mails a signed link; accepting checks the
//! token against the signed-in user, grants collaborator rights and consumes
//! the pending row.

use crate::config::AuthConfig;
use crate::db::repositories::{InvitationRepository, UserRepository};
use crate::models::{CourseWithTags, PendingCollaborator, User};
use crate::services::course::{CourseService, CourseServiceError};
use crate::services::email::{Delivery, EmailService};
use crate::services::token::{InviteClaims, TokenSigner, INVITE_TOKEN_SALT};
use crate::services::validation::{normalize_email, FieldError};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InvitationServiceError {
    #[error("{0}")]
    ValidationError(#[from] FieldError),

    #[error("Invalid or expired invitation")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("Invitation not found")]
    NotFound,

    /// The invitee already has rights on the course
    #[error("{0}")]
    AlreadyMember(String),

    #[error(transparent)]
    Course(#[from] CourseServiceError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of an invite; the token is only exposed when no email went out
#[derive(Debug, Clone, Serialize)]
pub struct InviteOutcome {
    pub invitation: PendingCollaborator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

pub struct InvitationService {
    repo: Arc<dyn InvitationRepository>,
    users: Arc<dyn UserRepository>,
    courses: Arc<CourseService>,
    email: Arc<EmailService>,
    signer: TokenSigner,
    ttl: Duration,
    public_url: String,
}

impl InvitationService {
    pub fn new(
        repo: Arc<dyn InvitationRepository>,
        users: Arc<dyn UserRepository>,
        courses: Arc<CourseService>,
        email: Arc<EmailService>,
        auth: &AuthConfig,
        public_url: &str,
    ) -> Self {
        Self {
            repo,
            users,
            courses,
            email,
            signer: TokenSigner::new(&auth.jwt_secret, INVITE_TOKEN_SALT),
            ttl: Duration::hours(auth.invite_ttl_hours),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn invite(
        &self,
        actor: &User,
        course_id: i64,
        email: &str,
    ) -> Result<InviteOutcome, InvitationServiceError> {
        let course = self.courses.resolve_manage(course_id, actor).await?.course.course;
        let email = normalize_email(email)?;

        if let Some(invitee) = self
            .users
            .get_by_email(&email)
            .await
            .context("Failed to look up invitee")?
        {
            if invitee.id == course.creator_id {
                return Err(InvitationServiceError::AlreadyMember(
                    "The course creator cannot be invited".to_string(),
                ));
            }
            if self.courses.is_collaborator(course_id, invitee.id).await? {
                return Err(InvitationServiceError::AlreadyMember(format!(
                    "{} is already a collaborator",
                    email
                )));
            }
        }

        let expires_at = Utc::now() + self.ttl;
        let invitation = self
            .repo
            .upsert(&PendingCollaborator::new(course_id, email.clone(), actor.id, expires_at))
            .await
            .context("Failed to save invitation")?;

        let token = self
            .signer
            .sign(&InviteClaims {
                course_id,
                email: email.clone(),
                exp: expires_at.timestamp(),
            })
            .context("Failed to sign invitation token")?;
        let link = format!("{}/api/v1/invitations/accept?token={}", self.public_url, token);

        let delivery = self
            .email
            .send_invitation(&email, &course.title, &actor.display_name(), &link)
            .await
            .context("Failed to send invitation email")?;

        tracing::info!(course_id, invitee = %email, inviter_id = actor.id, "Collaborator invited");
        Ok(InviteOutcome {
            invitation,
            token: (delivery == Delivery::Logged).then_some(token),
        })
    }

    /// Accept an invitation as the signed-in user; returns the course.
    pub async fn accept(&self, actor: &User, token: &str) -> Result<CourseWithTags, InvitationServiceError> {
        let claims: InviteClaims = self
            .signer
            .verify(token)
            .map_err(|_| InvitationServiceError::InvalidToken)?;

        if !claims.email.eq_ignore_ascii_case(&actor.email) {
            return Err(InvitationServiceError::Forbidden(
                "This invitation was sent to a different email address".to_string(),
            ));
        }

        let pending = self
            .repo
            .get(claims.course_id, &claims.email)
            .await
            .context("Failed to get invitation")?
            .ok_or(InvitationServiceError::NotFound)?;

        self.courses.add_collaborator(pending.course_id, actor.id).await?;
        self.repo
            .delete(pending.course_id, &pending.email)
            .await
            .context("Failed to consume invitation")?;
        tracing::info!(course_id = pending.course_id, user_id = actor.id, "Invitation accepted");

        Ok(self.courses.resolve(pending.course_id, Some(actor)).await?.course)
    }

    /// Pending invitations of a course
    pub async fn list(&self, actor: &User, course_id: i64) -> Result<Vec<PendingCollaborator>, InvitationServiceError> {
        self.courses.resolve_manage(course_id, actor).await?;
        Ok(self
            .repo
            .list_for_course(course_id)
            .await
            .context("Failed to list invitations")?)
    }

    pub async fn revoke(&self, actor: &User, course_id: i64, email: &str) -> Result<(), InvitationServiceError> {
        self.courses.resolve_manage(course_id, actor).await?;
        let email = email.trim().to_lowercase();
        let removed = self
            .repo
            .delete(course_id, &email)
            .await
            .context("Failed to revoke invitation")?;
        if !removed {
            return Err(InvitationServiceError::NotFound);
        }
        tracing::info!(course_id, invitee = %email, "Invitation revoked");
        Ok(())
    }

    pub async fn cleanup_expired(&self) -> Result<u64, InvitationServiceError> {
        Ok(self
            .repo
            .delete_expired()
            .await
            .context("Failed to delete expired invitations")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::db::repositories::SqlxInvitationRepository;
    use crate::models::{CourseStatus, UserRole};
    use crate::services::course::tests::{setup_test_service as setup_courses, Fixture};

    async fn setup() -> (Fixture, InvitationService) {
        let f = setup_courses().await;
        let service = InvitationService::new(
            SqlxInvitationRepository::boxed(f.pool.clone()),
            f.users.clone(),
            f.service.clone(),
            Arc::new(EmailService::new(EmailConfig::default())),
            &AuthConfig::default(),
            "http://localhost:8080/",
        );
        (f, service)
    }

    #[tokio::test]
    async fn test_invite_and_accept() {
        let (f, service) = setup().await;
        let owner = f.user("o@example.com", UserRole::Student).await;
        let invitee = f.user("i@example.com", UserRole::Student).await;
        let course = f.course(&owner, "Rust", CourseStatus::Draft).await.course.id;

        let outcome = service.invite(&owner, course, " I@Example.com ").await.unwrap();
        assert_eq!(outcome.invitation.email, "i@example.com");
        let token = outcome.token.expect("token is returned when email is disabled");
        assert_eq!(service.list(&owner, course).await.unwrap().len(), 1);

        let accepted = service.accept(&invitee, &token).await.unwrap();
        assert_eq!(accepted.course.id, course);
        assert!(f.service.is_collaborator(course, invitee.id).await.unwrap());
        assert!(service.list(&owner, course).await.unwrap().is_empty());

        // The pending row is consumed
        assert!(matches!(
            service.accept(&invitee, &token).await,
            Err(InvitationServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_token_bound_to_email() {
        let (f, service) = setup().await;
        let owner = f.user("o@example.com", UserRole::Student).await;
        let intruder = f.user("x@example.com", UserRole::Student).await;
        let course = f.course(&owner, "Rust", CourseStatus::Public).await.course.id;
        let token = service
            .invite(&owner, course, "i@example.com")
            .await
            .unwrap()
            .token
            .unwrap();

        assert!(matches!(
            service.accept(&intruder, &token).await,
            Err(InvitationServiceError::Forbidden(_))
        ));

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(
            service.accept(&intruder, &tampered).await,
            Err(InvitationServiceError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_cannot_invite_members() {
        let (f, service) = setup().await;
        let owner = f.user("o@example.com", UserRole::Student).await;
        let helper = f.user("h@example.com", UserRole::Student).await;
        let course = f.course(&owner, "Rust", CourseStatus::Public).await.course.id;
        f.service.add_collaborator(course, helper.id).await.unwrap();

        for email in ["o@example.com", "h@example.com"] {
            assert!(matches!(
                service.invite(&owner, course, email).await,
                Err(InvitationServiceError::AlreadyMember(_))
            ));
        }
        assert!(matches!(
            service.invite(&owner, course, "not-an-email").await,
            Err(InvitationServiceError::ValidationError(_))
        ));
        // Collaborators cannot invite
        assert!(matches!(
            service.invite(&helper, course, "n@example.com").await,
            Err(InvitationServiceError::Course(CourseServiceError::Forbidden(_)))
        ));
    }

    #[tokio::test]
    async fn test_revoke() {
        let (f, service) = setup().await;
        let owner = f.user("o@example.com", UserRole::Student).await;
        let course = f.course(&owner, "Rust", CourseStatus::Public).await.course.id;
        service.invite(&owner, course, "i@example.com").await.unwrap();

        service.revoke(&owner, course, "I@example.com").await.unwrap();
        assert!(matches!(
            service.revoke(&owner, course, "i@example.com").await,
            Err(InvitationServiceError::NotFound)
        ));
        assert_eq!(service.cleanup_expired().await.unwrap(), 0);
    }
}
