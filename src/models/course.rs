//! Course model
//!
//! A course is owned by its creator, optionally filed under a category,
//! labelled with tags and made of ordered lessons. Who may see or change a
//! course is decided by [`CourseAccess`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Tag;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: CourseStatus,
    pub creator_id: i64,
    pub category_id: Option<i64>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn new(title: String, description: String, status: CourseStatus, creator_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            title,
            description,
            status,
            creator_id,
            category_id: None,
            cover_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Publication state of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    /// Work in progress, visible to its editors only
    #[default]
    Draft,
    /// Listed, searchable and open for enrollment
    Public,
    /// Visible to editors and enrolled students only
    Private,
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseStatus::Draft => write!(f, "draft"),
            CourseStatus::Public => write!(f, "public"),
            CourseStatus::Private => write!(f, "private"),
        }
    }
}

impl FromStr for CourseStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(CourseStatus::Draft),
            "public" => Ok(CourseStatus::Public),
            "private" => Ok(CourseStatus::Private),
            _ => Err(anyhow::anyhow!("Invalid course status: {}", s)),
        }
    }
}

/// A course together with its tags, as cached and returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseWithTags {
    #[serde(flatten)]
    pub course: Course,
    pub tags: Vec<Tag>,
}

/// Input for creating a course
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: CourseStatus,
    pub category_id: Option<i64>,
    pub cover_url: Option<String>,
    /// Tag names; unknown names are created
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for updating a course; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<CourseStatus>,
    pub category_id: Option<i64>,
    pub cover_url: Option<String>,
    /// Replaces the whole tag set when present
    pub tags: Option<Vec<String>>,
}

/// Filters for the public course listing
#[derive(Debug, Clone, Default)]
pub struct CourseSearch {
    /// Case-insensitive substring over title, tag names and description
    pub query: Option<String>,
    /// Exact tag name (case-insensitive)
    pub tag: Option<String>,
}

/// What a particular viewer may do with a particular course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CourseAccess {
    pub is_creator: bool,
    pub is_collaborator: bool,
    pub is_enrolled: bool,
    pub is_admin: bool,
}

impl CourseAccess {
    /// Update or delete the course, manage collaborators, delete lessons
    pub fn can_manage(&self) -> bool {
        self.is_creator || self.is_admin
    }

    /// Create, update and reorder lessons
    pub fn can_edit_content(&self) -> bool {
        self.can_manage() || self.is_collaborator
    }

    pub fn can_view(&self, status: CourseStatus) -> bool {
        match status {
            CourseStatus::Public => true,
            CourseStatus::Private => self.can_edit_content() || self.is_enrolled,
            CourseStatus::Draft => self.can_edit_content(),
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create pagination parameters, clamping to a sane range
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        let total = self.total.max(0) as u64;
        total.div_ceil(self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Convert the items while keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [CourseStatus::Draft, CourseStatus::Public, CourseStatus::Private] {
            assert_eq!(status.to_string().parse::<CourseStatus>().unwrap(), status);
        }
        assert!("archived".parse::<CourseStatus>().is_err());
    }

    #[test]
    fn test_access_matrix() {
        let stranger = CourseAccess::default();
        let student = CourseAccess { is_enrolled: true, ..Default::default() };
        let collaborator = CourseAccess { is_collaborator: true, ..Default::default() };
        let creator = CourseAccess { is_creator: true, ..Default::default() };
        let admin = CourseAccess { is_admin: true, ..Default::default() };

        assert!(stranger.can_view(CourseStatus::Public));
        assert!(!stranger.can_view(CourseStatus::Private));
        assert!(!stranger.can_view(CourseStatus::Draft));

        assert!(student.can_view(CourseStatus::Private));
        assert!(!student.can_view(CourseStatus::Draft));
        assert!(!student.can_edit_content());

        assert!(collaborator.can_view(CourseStatus::Draft));
        assert!(collaborator.can_edit_content());
        assert!(!collaborator.can_manage());

        assert!(creator.can_manage());
        assert!(admin.can_manage());
        assert!(admin.can_view(CourseStatus::Draft));
    }

    #[test]
    fn test_list_params_clamps() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(ListParams::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_paged_result_pages() {
        let result = PagedResult::new(vec![1, 2], 21, &ListParams::new(2, 10));
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
        assert!(result.has_prev());

        let empty: PagedResult<i32> = PagedResult::new(vec![], 0, &ListParams::default());
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Every item index below `total` lands on exactly one page.
        #[test]
        fn pages_cover_total(total in 0i64..1000, per_page in 1u32..100) {
            let params = ListParams::new(1, per_page);
            let result: PagedResult<()> = PagedResult::new(vec![], total, &params);
            let pages = result.total_pages() as i64;
            prop_assert!(pages * per_page as i64 >= total);
            prop_assert!((pages - 1).max(0) * (per_page as i64) < total.max(1));
        }
    }
}
