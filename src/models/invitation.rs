//! Collaborator invitation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A staged collaborator invitation, consumed when the invitee accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingCollaborator {
    pub id: i64,
    pub course_id: i64,
    /// Invitee email, lowercase
    pub email: String,
    pub invited_by: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingCollaborator {
    pub fn new(course_id: i64, email: String, invited_by: i64, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: 0, // Will be set by the database
            course_id,
            email,
            invited_by,
            created_at: Utc::now(),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
