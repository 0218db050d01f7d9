//! Course service
//!
//! Owns the access rules: every operation that touches a course goes through
//! [`CourseService::resolve`], which loads the course, works out the viewer's
//! [`CourseAccess`] and hides courses the viewer may not see (reported as not
//! found, never as forbidden).
//!
//! Course rows with their tags are cached under `course:{id}`.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{CategoryRepository, CourseRepository, LessonRepository, UserRepository};
use crate::models::{
    Course, CourseAccess, CourseSearch, CourseStatus, CourseWithTags, CreateCourseInput, Lesson,
    LessonWindow, ListParams, PagedResult, PublicProfile, UpdateCourseInput, User,
};
use crate::services::tag::{TagService, TagServiceError};
use crate::services::validation::{validate_title, validate_url, FieldError};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on related courses in a course detail
pub const MAX_RELATED: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("{0}")]
    ValidationError(#[from] FieldError),

    #[error("Course not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    /// Another course already has this title with this status
    #[error("A {status} course titled '{title}' already exists")]
    DuplicateTitle { title: String, status: CourseStatus },

    #[error("Already enrolled")]
    AlreadyEnrolled,

    #[error("Not enrolled in this course")]
    NotEnrolled,

    #[error("Only public courses accept enrollment")]
    NotOpenForEnrollment,

    #[error("User is not a collaborator on this course")]
    NotCollaborator,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for CourseServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(e) => CourseServiceError::ValidationError(e),
            TagServiceError::NotFound => CourseServiceError::NotFound,
            TagServiceError::InternalError(e) => CourseServiceError::InternalError(e),
        }
    }
}

/// What the current viewer can do with a course
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ViewerFlags {
    pub enrolled: bool,
    pub favorite: bool,
    pub can_edit: bool,
    pub can_manage: bool,
}

/// Everything the course page needs in one response
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseWithTags,
    pub lessons: Vec<Lesson>,
    pub student_count: i64,
    pub related: Vec<Course>,
    pub viewer: ViewerFlags,
}

/// A course the viewer may see, with the viewer's access to it
#[derive(Debug, Clone)]
pub struct ResolvedCourse {
    pub course: CourseWithTags,
    pub access: CourseAccess,
}

pub struct CourseService {
    course_repo: Arc<dyn CourseRepository>,
    lesson_repo: Arc<dyn LessonRepository>,
    user_repo: Arc<dyn UserRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    tags: Arc<TagService>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl CourseService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        lesson_repo: Arc<dyn LessonRepository>,
        user_repo: Arc<dyn UserRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        tags: Arc<TagService>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            course_repo,
            lesson_repo,
            user_repo,
            category_repo,
            tags,
            cache,
            cache_ttl,
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Load a course the viewer is allowed to see.
    pub async fn resolve(&self, id: i64, viewer: Option<&User>) -> Result<ResolvedCourse, CourseServiceError> {
        let course = self.load(id).await?;
        let access = self.access_for(&course.course, viewer).await?;
        if !access.can_view(course.course.status) {
            return Err(CourseServiceError::NotFound);
        }
        Ok(ResolvedCourse { course, access })
    }

    /// Like [`resolve`](Self::resolve), additionally requiring Manage.
    pub async fn resolve_manage(&self, id: i64, actor: &User) -> Result<ResolvedCourse, CourseServiceError> {
        let resolved = self.resolve(id, Some(actor)).await?;
        if !resolved.access.can_manage() {
            return Err(CourseServiceError::Forbidden(
                "Only the course creator can do this".to_string(),
            ));
        }
        Ok(resolved)
    }

    /// Like [`resolve`](Self::resolve), additionally requiring Edit content.
    pub async fn resolve_edit(&self, id: i64, actor: &User) -> Result<ResolvedCourse, CourseServiceError> {
        let resolved = self.resolve(id, Some(actor)).await?;
        if !resolved.access.can_edit_content() {
            return Err(CourseServiceError::Forbidden(
                "Only the course creator or a collaborator can do this".to_string(),
            ));
        }
        Ok(resolved)
    }

    pub async fn access_for(&self, course: &Course, viewer: Option<&User>) -> Result<CourseAccess, CourseServiceError> {
        let Some(viewer) = viewer else {
            return Ok(CourseAccess::default());
        };
        let is_creator = course.creator_id == viewer.id;
        let is_collaborator = !is_creator
            && self
                .course_repo
                .is_collaborator(course.id, viewer.id)
                .await
                .context("Failed to check collaborator")?;
        let is_enrolled = self
            .course_repo
            .is_enrolled(course.id, viewer.id)
            .await
            .context("Failed to check enrollment")?;

        Ok(CourseAccess {
            is_creator,
            is_collaborator,
            is_enrolled,
            is_admin: viewer.is_admin(),
        })
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    pub async fn create(&self, actor: &User, input: CreateCourseInput) -> Result<CourseWithTags, CourseServiceError> {
        let title = validate_title(&input.title)?;
        self.ensure_title_free(&title, input.status, None).await?;
        self.ensure_category(input.category_id).await?;

        let mut course = Course::new(title, input.description.trim().to_string(), input.status, actor.id);
        course.category_id = input.category_id;
        course.cover_url = validate_url("cover_url", input.cover_url)?;

        let course = self
            .course_repo
            .create(&course)
            .await
            .context("Failed to create course")?;
        let tags = self.tags.set_course_tags(course.id, &input.tags).await?;

        tracing::info!(course_id = course.id, creator_id = actor.id, "Course created");
        Ok(CourseWithTags { course, tags })
    }

    /// Course page: the course plus lessons, counts, related courses and the
    /// viewer's own flags.
    pub async fn detail(&self, id: i64, viewer: Option<&User>) -> Result<CourseDetail, CourseServiceError> {
        let ResolvedCourse { course, access } = self.resolve(id, viewer).await?;

        let lessons = self
            .lesson_repo
            .list_by_course(id, &LessonWindow::default())
            .await
            .context("Failed to list lessons")?;
        let student_count = self
            .course_repo
            .count_students(id)
            .await
            .context("Failed to count students")?;
        let related = self
            .course_repo
            .related(&course.course, MAX_RELATED)
            .await
            .context("Failed to load related courses")?;
        let favorite = match viewer {
            Some(v) => self
                .course_repo
                .is_favorite(id, v.id)
                .await
                .context("Failed to check favorite")?,
            None => false,
        };

        Ok(CourseDetail {
            course,
            lessons,
            student_count,
            related,
            viewer: ViewerFlags {
                enrolled: access.is_enrolled,
                favorite,
                can_edit: access.can_edit_content(),
                can_manage: access.can_manage(),
            },
        })
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateCourseInput,
    ) -> Result<CourseWithTags, CourseServiceError> {
        let ResolvedCourse { course, .. } = self.resolve_manage(id, actor).await?;
        let mut course = course.course;

        if let Some(title) = input.title {
            course.title = validate_title(&title)?;
        }
        if let Some(description) = input.description {
            course.description = description.trim().to_string();
        }
        if let Some(status) = input.status {
            course.status = status;
        }
        if input.category_id.is_some() {
            self.ensure_category(input.category_id).await?;
            course.category_id = input.category_id;
        }
        if input.cover_url.is_some() {
            course.cover_url = validate_url("cover_url", input.cover_url)?;
        }
        self.ensure_title_free(&course.title, course.status, Some(id)).await?;

        let course = self
            .course_repo
            .update(&course)
            .await
            .context("Failed to update course")?;
        let tags = match input.tags {
            Some(names) => self.tags.set_course_tags(id, &names).await?,
            None => self.tags.for_course(id).await?,
        };

        self.invalidate(id).await;
        Ok(CourseWithTags { course, tags })
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), CourseServiceError> {
        self.resolve_manage(id, actor).await?;
        self.course_repo
            .delete(id)
            .await
            .context("Failed to delete course")?;
        self.invalidate(id).await;
        tracing::info!(course_id = id, actor_id = actor.id, "Course deleted");
        Ok(())
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Ranked search over public courses
    pub async fn search(
        &self,
        search: &CourseSearch,
        params: &ListParams,
    ) -> Result<PagedResult<CourseWithTags>, CourseServiceError> {
        let (courses, total) = self
            .course_repo
            .search(search, params)
            .await
            .context("Failed to search courses")?;
        let items = self.with_tags(courses).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Courses the user created
    pub async fn created_by(&self, user: &User) -> Result<Vec<CourseWithTags>, CourseServiceError> {
        let courses = self
            .course_repo
            .list_by_creator(user.id)
            .await
            .context("Failed to list created courses")?;
        self.with_tags(courses).await
    }

    pub async fn enrolled_in(&self, user: &User) -> Result<Vec<CourseWithTags>, CourseServiceError> {
        let courses = self
            .course_repo
            .list_enrolled(user.id)
            .await
            .context("Failed to list enrollments")?;
        self.with_tags(courses).await
    }

    /// Favorites the user can still see
    pub async fn favorites(&self, user: &User) -> Result<Vec<CourseWithTags>, CourseServiceError> {
        let courses = self
            .course_repo
            .list_favorites(user.id)
            .await
            .context("Failed to list favorites")?;
        let mut visible = Vec::with_capacity(courses.len());
        for course in courses {
            if self.access_for(&course, Some(user)).await?.can_view(course.status) {
                visible.push(course);
            }
        }
        self.with_tags(visible).await
    }

    // ========================================================================
    // Enrollment and favorites
    // ========================================================================

    pub async fn enroll(&self, actor: &User, id: i64) -> Result<(), CourseServiceError> {
        let ResolvedCourse { course, access } = self.resolve(id, Some(actor)).await?;
        if course.course.status != CourseStatus::Public {
            return Err(CourseServiceError::NotOpenForEnrollment);
        }
        if access.is_enrolled {
            return Err(CourseServiceError::AlreadyEnrolled);
        }
        // A concurrent enroll may have landed since the check above
        let inserted = self
            .course_repo
            .enroll(id, actor.id)
            .await
            .context("Failed to enroll")?;
        if !inserted {
            return Err(CourseServiceError::AlreadyEnrolled);
        }
        tracing::info!(course_id = id, user_id = actor.id, "User enrolled");
        Ok(())
    }

    pub async fn unenroll(&self, actor: &User, id: i64) -> Result<(), CourseServiceError> {
        self.resolve(id, Some(actor)).await?;
        let removed = self
            .course_repo
            .unenroll(id, actor.id)
            .await
            .context("Failed to unenroll")?;
        if !removed {
            return Err(CourseServiceError::NotEnrolled);
        }
        Ok(())
    }

    pub async fn add_favorite(&self, actor: &User, id: i64) -> Result<(), CourseServiceError> {
        self.resolve(id, Some(actor)).await?;
        self.course_repo
            .add_favorite(id, actor.id)
            .await
            .context("Failed to add favorite")?;
        Ok(())
    }

    /// Removing a course that is not a favorite is not an error
    pub async fn remove_favorite(&self, actor: &User, id: i64) -> Result<(), CourseServiceError> {
        self.load(id).await?;
        self.course_repo
            .remove_favorite(id, actor.id)
            .await
            .context("Failed to remove favorite")?;
        Ok(())
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    pub async fn collaborators(&self, actor: &User, id: i64) -> Result<Vec<PublicProfile>, CourseServiceError> {
        self.resolve_manage(id, actor).await?;
        let ids = self
            .course_repo
            .list_collaborator_ids(id)
            .await
            .context("Failed to list collaborators")?;

        let mut profiles = Vec::with_capacity(ids.len());
        for user_id in ids {
            if let Some(user) = self
                .user_repo
                .get_by_id(user_id)
                .await
                .context("Failed to load collaborator")?
            {
                profiles.push(PublicProfile::from_user(&user, true));
            }
        }
        Ok(profiles)
    }

    pub async fn remove_collaborator(&self, actor: &User, id: i64, user_id: i64) -> Result<(), CourseServiceError> {
        self.resolve_manage(id, actor).await?;
        let removed = self
            .course_repo
            .remove_collaborator(id, user_id)
            .await
            .context("Failed to remove collaborator")?;
        if !removed {
            return Err(CourseServiceError::NotCollaborator);
        }
        tracing::info!(course_id = id, user_id, "Collaborator removed");
        Ok(())
    }

    /// Grant collaborator rights; used when an invitation is accepted
    pub async fn add_collaborator(&self, id: i64, user_id: i64) -> Result<(), CourseServiceError> {
        self.course_repo
            .add_collaborator(id, user_id)
            .await
            .context("Failed to add collaborator")?;
        Ok(())
    }

    pub async fn is_collaborator(&self, id: i64, user_id: i64) -> Result<bool, CourseServiceError> {
        Ok(self
            .course_repo
            .is_collaborator(id, user_id)
            .await
            .context("Failed to check collaborator")?)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Course plus tags, from cache when possible
    async fn load(&self, id: i64) -> Result<CourseWithTags, CourseServiceError> {
        let key = cache_key(id);
        if let Some(course) = self.cache.get::<CourseWithTags>(&key).await.ok().flatten() {
            return Ok(course);
        }

        let course = self
            .course_repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or(CourseServiceError::NotFound)?;
        let tags = self.tags.for_course(id).await?;
        let loaded = CourseWithTags { course, tags };

        let _ = self.cache.set(&key, &loaded, self.cache_ttl).await;
        Ok(loaded)
    }

    async fn with_tags(&self, courses: Vec<Course>) -> Result<Vec<CourseWithTags>, CourseServiceError> {
        let mut out = Vec::with_capacity(courses.len());
        for course in courses {
            let tags = self.tags.for_course(course.id).await?;
            out.push(CourseWithTags { course, tags });
        }
        Ok(out)
    }

    async fn ensure_title_free(
        &self,
        title: &str,
        status: CourseStatus,
        except: Option<i64>,
    ) -> Result<(), CourseServiceError> {
        let existing = self
            .course_repo
            .find_by_title_status(title, status)
            .await
            .context("Failed to check course title")?;
        match existing {
            Some(c) if Some(c.id) != except => Err(CourseServiceError::DuplicateTitle {
                title: title.to_string(),
                status,
            }),
            _ => Ok(()),
        }
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<(), CourseServiceError> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let exists = self
            .category_repo
            .get_by_id(category_id)
            .await
            .context("Failed to check category")?
            .is_some();
        if !exists {
            return Err(FieldError::new("category_id", "Category not found").into());
        }
        Ok(())
    }

    async fn invalidate(&self, id: i64) {
        let _ = self.cache.delete(&cache_key(id)).await;
    }
}

fn cache_key(id: i64) -> String {
    format!("course:{}", id)
}
