//! Tag model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A free-form label attached to courses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    /// Unique name
    pub name: String,
    /// URL-friendly slug
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            name,
            slug,
            created_at: Utc::now(),
        }
    }
}

/// Tag with the number of courses carrying it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub course_count: i64,
}

/// Generate a URL-friendly slug from a tag name.
///
/// Lowercases, turns separators and ASCII punctuation into single hyphens,
/// keeps non-ASCII letters and trims hyphens at both ends.
pub fn slugify(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_hyphen = true;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || !c.is_ascii() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Web  Dev!! "), "web-dev");
        assert_eq!(slugify("C++"), "c");
        assert_eq!(slugify("Rust_Async-IO"), "rust-async-io");
        assert_eq!(slugify("Café"), "café");
        assert_eq!(slugify("!!!"), "");
    }
}
