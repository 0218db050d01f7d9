//! Lesson model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ordered unit of a course. `position` is 1-based and unique within
/// the course; gaps are allowed after deletions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Markdown body
    pub content: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    pub fn new(course_id: i64, title: String, content: String, position: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            course_id,
            title,
            description: None,
            content,
            position,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateLessonInput {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Appended after the last lesson when omitted
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLessonInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub position: Option<i64>,
}

/// Offset window over a course's lessons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonWindow {
    pub skip: i64,
    pub limit: i64,
}

impl Default for LessonWindow {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}
