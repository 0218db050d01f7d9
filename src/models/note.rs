//! Note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A private markdown note a user keeps on a lesson.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub lesson_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(user_id: i64, lesson_id: i64, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            user_id,
            lesson_id,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Body of a note create or update request
#[derive(Debug, Clone, Deserialize)]
pub struct NoteInput {
    pub content: String,
}
