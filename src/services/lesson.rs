//! Lesson service
//!
//! Lessons inherit their visibility and permissions from the course; the
//! course service does the access check and this service handles ordering.

use crate::db::repositories::LessonRepository;
use crate::models::{CreateLessonInput, Lesson, LessonWindow, UpdateLessonInput, User};
use crate::services::course::{CourseService, CourseServiceError};
use crate::services::markdown::MarkdownRenderer;
use crate::services::validation::{validate_title, FieldError};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Largest page of lessons returned by one list call
pub const MAX_LESSON_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum LessonServiceError {
    #[error("{0}")]
    ValidationError(#[from] FieldError),

    #[error("Lesson not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Position {0} is already taken")]
    PositionTaken(i64),

    /// The submitted ordering is not a permutation of the course's lessons
    #[error("{0}")]
    InvalidOrder(String),

    #[error(transparent)]
    Course(#[from] CourseServiceError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A lesson with its rendered body
#[derive(Debug, Clone, Serialize)]
pub struct LessonView {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub content_html: String,
}

pub struct LessonService {
    repo: Arc<dyn LessonRepository>,
    courses: Arc<CourseService>,
    renderer: MarkdownRenderer,
}

impl LessonService {
    pub fn new(repo: Arc<dyn LessonRepository>, courses: Arc<CourseService>) -> Self {
        Self {
            repo,
            courses,
            renderer: MarkdownRenderer::new(),
        }
    }

    /// Lessons of a visible course, by position
    pub async fn list(
        &self,
        course_id: i64,
        viewer: Option<&User>,
        window: LessonWindow,
    ) -> Result<Vec<Lesson>, LessonServiceError> {
        if window.skip < 0 {
            return Err(FieldError::new("skip", "skip cannot be negative").into());
        }
        if !(1..=MAX_LESSON_LIMIT).contains(&window.limit) {
            return Err(FieldError::new(
                "limit",
                format!("limit must be between 1 and {}", MAX_LESSON_LIMIT),
            )
            .into());
        }

        self.courses.resolve(course_id, viewer).await?;
        Ok(self
            .repo
            .list_by_course(course_id, &window)
            .await
            .context("Failed to list lessons")?)
    }

    pub async fn get(&self, id: i64, viewer: Option<&User>) -> Result<LessonView, LessonServiceError> {
        let lesson = self.find(id).await?;
        self.courses
            .resolve(lesson.course_id, viewer)
            .await
            .map_err(hide_course)?;
        Ok(self.view(lesson))
    }

    /// The lesson, once the viewer is known to see its course
    pub async fn get_visible(&self, id: i64, viewer: &User) -> Result<Lesson, LessonServiceError> {
        let lesson = self.find(id).await?;
        self.courses
            .resolve(lesson.course_id, Some(viewer))
            .await
            .map_err(hide_course)?;
        Ok(lesson)
    }

    pub async fn create(
        &self,
        actor: &User,
        course_id: i64,
        input: CreateLessonInput,
    ) -> Result<Lesson, LessonServiceError> {
        self.courses.resolve_edit(course_id, actor).await?;
        let title = validate_title(&input.title)?;

        let position = match input.position {
            Some(position) => {
                self.ensure_position_free(course_id, position, None).await?;
                position
            }
            None => {
                self.repo
                    .max_position(course_id)
                    .await
                    .context("Failed to get last lesson position")?
                    + 1
            }
        };

        let mut lesson = Lesson::new(course_id, title, input.content, position);
        lesson.description = clean(input.description);
        let lesson = self
            .repo
            .create(&lesson)
            .await
            .context("Failed to create lesson")?;

        tracing::info!(lesson_id = lesson.id, course_id, position, "Lesson created");
        Ok(lesson)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateLessonInput,
    ) -> Result<Lesson, LessonServiceError> {
        let mut lesson = self.find(id).await?;
        self.courses
            .resolve_edit(lesson.course_id, actor)
            .await
            .map_err(hide_course)?;

        if let Some(title) = input.title {
            lesson.title = validate_title(&title)?;
        }
        if input.description.is_some() {
            lesson.description = clean(input.description);
        }
        if let Some(content) = input.content {
            lesson.content = content;
        }
        if let Some(position) = input.position {
            if position != lesson.position {
                self.ensure_position_free(lesson.course_id, position, Some(id))
                    .await?;
                lesson.position = position;
            }
        }

        Ok(self
            .repo
            .update(&lesson)
            .await
            .context("Failed to update lesson")?)
    }

    /// Delete a lesson. Positions after it keep their values.
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), LessonServiceError> {
        let lesson = self.find(id).await?;
        self.courses
            .resolve_manage(lesson.course_id, actor)
            .await
            .map_err(hide_course)?;

        self.repo.delete(id).await.context("Failed to delete lesson")?;
        tracing::info!(lesson_id = id, course_id = lesson.course_id, "Lesson deleted");
        Ok(())
    }

    /// Give the course's lessons positions 1..N in the order of `ordered_ids`,
    /// which must list every lesson of the course exactly once.
    pub async fn reorder(
        &self,
        actor: &User,
        course_id: i64,
        ordered_ids: &[i64],
    ) -> Result<Vec<Lesson>, LessonServiceError> {
        self.courses.resolve_edit(course_id, actor).await?;

        let current: HashSet<i64> = self
            .repo
            .ids_for_course(course_id)
            .await
            .context("Failed to list lesson ids")?
            .into_iter()
            .collect();
        check_permutation(&current, ordered_ids)?;

        self.repo
            .reorder(course_id, ordered_ids)
            .await
            .context("Failed to reorder lessons")?;
        tracing::info!(course_id, lessons = ordered_ids.len(), "Lessons reordered");

        Ok(self
            .repo
            .list_by_course(course_id, &LessonWindow::default())
            .await
            .context("Failed to list lessons")?)
    }

    fn view(&self, lesson: Lesson) -> LessonView {
        let content_html = self.renderer.render(&lesson.content);
        LessonView { lesson, content_html }
    }

    async fn find(&self, id: i64) -> Result<Lesson, LessonServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get lesson")?
            .ok_or(LessonServiceError::NotFound)
    }

    async fn ensure_position_free(
        &self,
        course_id: i64,
        position: i64,
        except: Option<i64>,
    ) -> Result<(), LessonServiceError> {
        if position < 1 {
            return Err(FieldError::new("position", "Position must be at least 1").into());
        }
        let taken = self
            .repo
            .position_taken(course_id, position, except)
            .await
            .context("Failed to check lesson position")?;
        if taken {
            return Err(LessonServiceError::PositionTaken(position));
        }
        Ok(())
    }
}

/// A lesson whose course is hidden is itself not found
fn hide_course(err: CourseServiceError) -> LessonServiceError {
    match err {
        CourseServiceError::NotFound => LessonServiceError::NotFound,
        other => other.into(),
    }
}

fn check_permutation(current: &HashSet<i64>, submitted: &[i64]) -> Result<(), LessonServiceError> {
    let mut seen = HashSet::with_capacity(submitted.len());
    for id in submitted {
        if !seen.insert(*id) {
            return Err(LessonServiceError::InvalidOrder(format!(
                "Lesson {} appears more than once",
                id
            )));
        }
        if !current.contains(id) {
            return Err(LessonServiceError::InvalidOrder(format!(
                "Lesson {} does not belong to this course",
                id
            )));
        }
    }
    if seen.len() != current.len() {
        return Err(LessonServiceError::InvalidOrder(
            "Every lesson of the course must be listed exactly once".to_string(),
        ));
    }
    Ok(())
}

fn clean(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
