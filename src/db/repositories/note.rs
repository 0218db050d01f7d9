//! Note repository

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::Note;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Note repository trait
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn create(&self, note: &Note) -> Result<Note>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Note>>;

    /// A user's notes, newest first, optionally limited to one lesson
    async fn list_for_user(&self, user_id: i64, lesson_id: Option<i64>) -> Result<Vec<Note>>;

    async fn update(&self, note: &Note) -> Result<Note>;

    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based note repository implementation
pub struct SqlxNoteRepository {
    pool: DynDatabasePool,
}

impl SqlxNoteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NoteRepository> {
        Arc::new(Self::new(pool))
    }
}

const NOTE_COLUMNS: &str = "id, user_id, lesson_id, content, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: i64,
    user_id: i64,
    lesson_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            user_id: row.user_id,
            lesson_id: row.lesson_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl NoteRepository for SqlxNoteRepository {
    async fn create(&self, note: &Note) -> Result<Note> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO notes (user_id, lesson_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(note.user_id)
            .bind(note.lesson_id)
            .bind(&note.content)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to insert note")?
            .inserted_id()
        });
        Ok(Note {
            id,
            created_at: now,
            updated_at: now,
            ..note.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Note>> {
        let sql = format!("SELECT {} FROM notes WHERE id = ?", NOTE_COLUMNS);
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, NoteRow>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get note")?
        });
        Ok(row.map(Note::from))
    }

    async fn list_for_user(&self, user_id: i64, lesson_id: Option<i64>) -> Result<Vec<Note>> {
        let filter = if lesson_id.is_some() { " AND lesson_id = ?" } else { "" };
        let sql = format!(
            "SELECT {} FROM notes WHERE user_id = ?{} ORDER BY created_at DESC, id DESC",
            NOTE_COLUMNS, filter
        );
        let rows = with_pool!(self.pool, |pool| {
            let mut query = sqlx::query_as::<_, NoteRow>(&sql).bind(user_id);
            if let Some(lesson_id) = lesson_id {
                query = query.bind(lesson_id);
            }
            query.fetch_all(pool).await.context("Failed to list notes")?
        });
        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn update(&self, note: &Note) -> Result<Note> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE notes SET content = ?, updated_at = ? WHERE id = ?")
                .bind(&note.content)
                .bind(now)
                .bind(note.id)
                .execute(pool)
                .await
                .context("Failed to update note")?
                .rows_affected()
        });
        Ok(Note {
            updated_at: now,
            ..note.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM notes WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete note")?
                .rows_affected()
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    /// Returns the repository, a user id and two lesson ids
    async fn setup() -> (SqlxNoteRepository, i64, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();
        let user = sqlx::query("INSERT INTO users (email, username, password_hash) VALUES ('a@x.io', 'a', 'h')")
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();
        let course = sqlx::query("INSERT INTO courses (title, status, creator_id) VALUES ('Rust', 'public', ?)")
            .bind(user)
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();
        let mut lessons = Vec::new();
        for position in 1..=2 {
            let id = sqlx::query("INSERT INTO lessons (course_id, title, position) VALUES (?, 'L', ?)")
                .bind(course)
                .bind(position)
                .execute(sqlite)
                .await
                .unwrap()
                .last_insert_rowid();
            lessons.push(id);
        }
        (SqlxNoteRepository::new(pool), user, lessons[0], lessons[1])
    }

    #[tokio::test]
    async fn test_note_crud() {
        let (repo, user, lesson, _) = setup().await;
        let mut note = repo.create(&Note::new(user, lesson, "first".into())).await.unwrap();
        assert!(note.id > 0);

        note.content = "**edited**".into();
        repo.update(&note).await.unwrap();
        assert_eq!(repo.get_by_id(note.id).await.unwrap().unwrap().content, "**edited**");

        repo.delete(note.id).await.unwrap();
        assert!(repo.get_by_id(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_lesson() {
        let (repo, user, first, second) = setup().await;
        repo.create(&Note::new(user, first, "a".into())).await.unwrap();
        repo.create(&Note::new(user, second, "b".into())).await.unwrap();
        repo.create(&Note::new(user, second, "c".into())).await.unwrap();

        assert_eq!(repo.list_for_user(user, None).await.unwrap().len(), 3);
        assert_eq!(repo.list_for_user(user, Some(second)).await.unwrap().len(), 2);
        assert!(repo.list_for_user(user + 1, None).await.unwrap().is_empty());
    }
}
