//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Server-side login session. Access tokens carry its id, so deleting the
/// row revokes every token issued for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (uuid v4)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a new session for `user_id` lasting `ttl`.
    pub fn new(user_id: i64, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_live() {
        let session = Session::new(1, Duration::hours(24));
        assert!(!session.is_expired());
        assert_eq!(session.id.len(), 36);
    }

    #[test]
    fn test_expired_session() {
        let session = Session::new(1, Duration::seconds(-1));
        assert!(session.is_expired());
    }
}
