//! Note service
//!
//! Notes are private: only their author can read or change them.

use crate::db::repositories::NoteRepository;
use crate::models::{Note, NoteInput, User};
use crate::services::lesson::{LessonService, LessonServiceError};
use crate::services::markdown::MarkdownRenderer;
use crate::services::validation::FieldError;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum NoteServiceError {
    #[error("{0}")]
    ValidationError(#[from] FieldError),

    #[error("Note not found")]
    NotFound,

    #[error("You can only access your own notes")]
    Forbidden,

    #[error(transparent)]
    Lesson(#[from] LessonServiceError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A note with its rendered body
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub content_html: String,
}

pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
    lessons: Arc<LessonService>,
    renderer: MarkdownRenderer,
}

impl NoteService {
    pub fn new(repo: Arc<dyn NoteRepository>, lessons: Arc<LessonService>) -> Self {
        Self {
            repo,
            lessons,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn create(&self, actor: &User, lesson_id: i64, input: NoteInput) -> Result<NoteView, NoteServiceError> {
        let content = validate_content(input.content)?;
        self.lessons.get_visible(lesson_id, actor).await?;

        let note = self
            .repo
            .create(&Note::new(actor.id, lesson_id, content))
            .await
            .context("Failed to create note")?;
        tracing::debug!(note_id = note.id, lesson_id, user_id = actor.id, "Note created");
        Ok(self.view(note))
    }

    /// The actor's notes, newest first, optionally for one lesson
    pub async fn list_mine(&self, actor: &User, lesson_id: Option<i64>) -> Result<Vec<NoteView>, NoteServiceError> {
        if let Some(lesson_id) = lesson_id {
            self.lessons.get_visible(lesson_id, actor).await?;
        }
        let notes = self
            .repo
            .list_for_user(actor.id, lesson_id)
            .await
            .context("Failed to list notes")?;
        Ok(notes.into_iter().map(|n| self.view(n)).collect())
    }

    pub async fn get(&self, actor: &User, id: i64) -> Result<NoteView, NoteServiceError> {
        let note = self.owned(actor, id).await?;
        Ok(self.view(note))
    }

    pub async fn update(&self, actor: &User, id: i64, input: NoteInput) -> Result<NoteView, NoteServiceError> {
        let mut note = self.owned(actor, id).await?;
        note.content = validate_content(input.content)?;
        let note = self
            .repo
            .update(&note)
            .await
            .context("Failed to update note")?;
        Ok(self.view(note))
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), NoteServiceError> {
        self.owned(actor, id).await?;
        self.repo.delete(id).await.context("Failed to delete note")?;
        Ok(())
    }

    async fn owned(&self, actor: &User, id: i64) -> Result<Note, NoteServiceError> {
        let note = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get note")?
            .ok_or(NoteServiceError::NotFound)?;
        if note.user_id != actor.id {
            return Err(NoteServiceError::Forbidden);
        }
        Ok(note)
    }

    fn view(&self, note: Note) -> NoteView {
        let content_html = self.renderer.render(&note.content);
        NoteView { note, content_html }
    }
}

fn validate_content(content: String) -> Result<String, FieldError> {
    if content.trim().is_empty() {
        return Err(FieldError::new("content", "Note content cannot be empty"));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxLessonRepository, SqlxNoteRepository};
    use crate::models::{CourseStatus, CreateLessonInput, UserRole};
    use crate::services::course::tests::{setup_test_service as setup_courses, Fixture};

    struct Setup {
        f: Fixture,
        lessons: Arc<LessonService>,
        notes: NoteService,
    }

    async fn setup() -> Setup {
        let f = setup_courses().await;
        let lessons = Arc::new(LessonService::new(
            SqlxLessonRepository::boxed(f.pool.clone()),
            f.service.clone(),
        ));
        let notes = NoteService::new(SqlxNoteRepository::boxed(f.pool.clone()), lessons.clone());
        Setup { f, lessons, notes }
    }

    impl Setup {
        async fn lesson(&self, owner: &User, status: CourseStatus) -> i64 {
            let course = self.f.course(owner, "Rust", status).await.course.id;
            self.lessons
                .create(owner, course, CreateLessonInput {
                    title: "Intro".into(),
                    ..Default::default()
                })
                .await
                .unwrap()
                .id
        }
    }

    fn input(content: &str) -> NoteInput {
        NoteInput {
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn test_create_renders_and_escapes_html() {
        let s = setup().await;
        let owner = s.f.user("o@example.com", UserRole::Student).await;
        let lesson = s.lesson(&owner, CourseStatus::Public).await;

        let note = s
            .notes
            .create(&owner, lesson, input("*remember* <script>x</script>"))
            .await
            .unwrap();
        assert!(note.content_html.contains("<em>remember</em>"));
        assert!(!note.content_html.contains("<script>"));

        assert!(matches!(
            s.notes.create(&owner, lesson, input("   ")).await,
            Err(NoteServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_notes_are_owner_only() {
        let s = setup().await;
        let owner = s.f.user("o@example.com", UserRole::Student).await;
        let other = s.f.user("x@example.com", UserRole::Student).await;
        let lesson = s.lesson(&owner, CourseStatus::Public).await;
        let note = s.notes.create(&owner, lesson, input("mine")).await.unwrap();
        let id = note.note.id;

        assert!(matches!(s.notes.get(&other, id).await, Err(NoteServiceError::Forbidden)));
        assert!(matches!(s.notes.update(&other, id, input("x")).await, Err(NoteServiceError::Forbidden)));
        assert!(matches!(s.notes.delete(&other, id).await, Err(NoteServiceError::Forbidden)));

        let updated = s.notes.update(&owner, id, input("changed")).await.unwrap();
        assert_eq!(updated.note.content, "changed");
        s.notes.delete(&owner, id).await.unwrap();
        assert!(matches!(s.notes.get(&owner, id).await, Err(NoteServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_cannot_note_hidden_lesson() {
        let s = setup().await;
        let owner = s.f.user("o@example.com", UserRole::Student).await;
        let other = s.f.user("x@example.com", UserRole::Student).await;
        let lesson = s.lesson(&owner, CourseStatus::Draft).await;

        assert!(matches!(
            s.notes.create(&other, lesson, input("sneaky")).await,
            Err(NoteServiceError::Lesson(LessonServiceError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_list_mine_filters_by_lesson() {
        let s = setup().await;
        let owner = s.f.user("o@example.com", UserRole::Student).await;
        let first = s.lesson(&owner, CourseStatus::Public).await;
        let course = s.f.course(&owner, "Second", CourseStatus::Public).await.course.id;
        let second = s
            .lessons
            .create(&owner, course, CreateLessonInput {
                title: "Other".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id;

        s.notes.create(&owner, first, input("a")).await.unwrap();
        s.notes.create(&owner, second, input("b")).await.unwrap();

        assert_eq!(s.notes.list_mine(&owner, None).await.unwrap().len(), 2);
        let filtered = s.notes.list_mine(&owner, Some(second)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].note.content, "b");
    }
}
