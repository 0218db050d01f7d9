//! Lesson repository

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::{Lesson, LessonWindow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Lesson repository trait
#[async_trait]
pub trait LessonRepository: Send + Sync {
    async fn create(&self, lesson: &Lesson) -> Result<Lesson>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Lesson>>;

    /// Lessons of a course in position order
    async fn list_by_course(&self, course_id: i64, window: &LessonWindow) -> Result<Vec<Lesson>>;

    async fn count_by_course(&self, course_id: i64) -> Result<i64>;

    /// Highest position in use, 0 for a course without lessons
    async fn max_position(&self, course_id: i64) -> Result<i64>;

    /// Whether another lesson of the course already sits at `position`
    async fn position_taken(&self, course_id: i64, position: i64, except_id: Option<i64>) -> Result<bool>;

    async fn update(&self, lesson: &Lesson) -> Result<Lesson>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Every lesson id of a course
    async fn ids_for_course(&self, course_id: i64) -> Result<Vec<i64>>;

    /// Assign positions `1..=n` following `ordered_ids`, atomically.
    ///
    /// Callers must pass exactly the course's lesson ids.
    async fn reorder(&self, course_id: i64, ordered_ids: &[i64]) -> Result<()>;
}

/// SQLx-based lesson repository implementation
pub struct SqlxLessonRepository {
    pool: DynDatabasePool,
}

impl SqlxLessonRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LessonRepository> {
        Arc::new(Self::new(pool))
    }
}

const LESSON_COLUMNS: &str =
    "id, course_id, title, description, content, position, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct LessonRow {
    id: i64,
    course_id: i64,
    title: String,
    description: Option<String>,
    content: String,
    position: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LessonRow> for Lesson {
    fn from(row: LessonRow) -> Self {
        Lesson {
            id: row.id,
            course_id: row.course_id,
            title: row.title,
            description: row.description,
            content: row.content,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl LessonRepository for SqlxLessonRepository {
    async fn create(&self, lesson: &Lesson) -> Result<Lesson> {
        let now = Utc::now();
        let sql = "INSERT INTO lessons (course_id, title, description, content, position, created_at, updated_at) \
                   VALUES (?, ?, ?, ?, ?, ?, ?)";
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(sql)
                .bind(lesson.course_id)
                .bind(&lesson.title)
                .bind(&lesson.description)
                .bind(&lesson.content)
                .bind(lesson.position)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to insert lesson")?
                .inserted_id()
        });
        Ok(Lesson {
            id,
            created_at: now,
            updated_at: now,
            ..lesson.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Lesson>> {
        let sql = format!("SELECT {} FROM lessons WHERE id = ?", LESSON_COLUMNS);
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, LessonRow>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get lesson")?
        });
        Ok(row.map(Lesson::from))
    }

    async fn list_by_course(&self, course_id: i64, window: &LessonWindow) -> Result<Vec<Lesson>> {
        let sql = format!(
            "SELECT {} FROM lessons WHERE course_id = ? ORDER BY position LIMIT ? OFFSET ?",
            LESSON_COLUMNS
        );
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, LessonRow>(&sql)
                .bind(course_id)
                .bind(window.limit)
                .bind(window.skip)
                .fetch_all(pool)
                .await
                .context("Failed to list lessons")?
        });
        Ok(rows.into_iter().map(Lesson::from).collect())
    }

    async fn count_by_course(&self, course_id: i64) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lessons WHERE course_id = ?")
                .bind(course_id)
                .fetch_one(pool)
                .await
                .context("Failed to count lessons")?
        });
        Ok(count)
    }

    async fn max_position(&self, course_id: i64) -> Result<i64> {
        let max = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(position) FROM lessons WHERE course_id = ?")
                .bind(course_id)
                .fetch_one(pool)
                .await
                .context("Failed to read max lesson position")?
        });
        Ok(max.unwrap_or(0))
    }

    async fn position_taken(&self, course_id: i64, position: i64, except_id: Option<i64>) -> Result<bool> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM lessons WHERE course_id = ? AND position = ? AND id <> ?",
            )
            .bind(course_id)
            .bind(position)
            .bind(except_id.unwrap_or(0))
            .fetch_one(pool)
            .await
            .context("Failed to check lesson position")?
        });
        Ok(count > 0)
    }

    async fn update(&self, lesson: &Lesson) -> Result<Lesson> {
        let now = Utc::now();
        let sql = "UPDATE lessons SET title = ?, description = ?, content = ?, position = ?, updated_at = ? WHERE id = ?";
        with_pool!(self.pool, |pool| {
            sqlx::query(sql)
                .bind(&lesson.title)
                .bind(&lesson.description)
                .bind(&lesson.content)
                .bind(lesson.position)
                .bind(now)
                .bind(lesson.id)
                .execute(pool)
                .await
                .context("Failed to update lesson")?
                .rows_affected()
        });
        Ok(Lesson {
            updated_at: now,
            ..lesson.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM lessons WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete lesson")?
                .rows_affected()
        });
        Ok(())
    }

    async fn ids_for_course(&self, course_id: i64) -> Result<Vec<i64>> {
        let ids = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT id FROM lessons WHERE course_id = ? ORDER BY position")
                .bind(course_id)
                .fetch_all(pool)
                .await
                .context("Failed to list lesson ids")?
        });
        Ok(ids)
    }

    async fn reorder(&self, course_id: i64, ordered_ids: &[i64]) -> Result<()> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            let mut tx = pool.begin().await?;
            // Park every lesson on a negative position first so the
            // (course_id, position) constraint never sees two rows collide.
            sqlx::query("UPDATE lessons SET position = -position WHERE course_id = ?")
                .bind(course_id)
                .execute(&mut *tx)
                .await
                .context("Failed to park lesson positions")?;
            for (index, id) in ordered_ids.iter().enumerate() {
                sqlx::query("UPDATE lessons SET position = ?, updated_at = ? WHERE id = ? AND course_id = ?")
                    .bind(index as i64 + 1)
                    .bind(now)
                    .bind(id)
                    .bind(course_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to set lesson position")?;
            }
            tx.commit().await?
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (SqlxLessonRepository, i64) {
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
        (SqlxLessonRepository::new(pool), course)
    }

    async fn add(repo: &SqlxLessonRepository, course: i64, title: &str, position: i64) -> Lesson {
        repo.create(&Lesson::new(course, title.into(), String::new(), position))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_positions_and_listing() {
        let (repo, course) = setup().await;
        assert_eq!(repo.max_position(course).await.unwrap(), 0);

        add(&repo, course, "second", 2).await;
        let first = add(&repo, course, "first", 1).await;
        add(&repo, course, "fifth", 5).await;

        assert_eq!(repo.max_position(course).await.unwrap(), 5);
        assert!(repo.position_taken(course, 1, None).await.unwrap());
        assert!(!repo.position_taken(course, 1, Some(first.id)).await.unwrap());
        assert!(!repo.position_taken(course, 3, None).await.unwrap());

        let titles: Vec<String> = repo
            .list_by_course(course, &LessonWindow::default())
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "fifth"]);

        let window = LessonWindow { skip: 1, limit: 1 };
        let page = repo.list_by_course(course, &window).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "second");
        assert_eq!(repo.count_by_course(course).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_position_rejected() {
        let (repo, course) = setup().await;
        add(&repo, course, "a", 1).await;
        let dup = repo
            .create(&Lesson::new(course, "b".into(), String::new(), 1))
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_reorder_assigns_contiguous_positions() {
        let (repo, course) = setup().await;
        let a = add(&repo, course, "a", 1).await;
        let b = add(&repo, course, "b", 2).await;
        let c = add(&repo, course, "c", 7).await;

        repo.reorder(course, &[c.id, a.id, b.id]).await.unwrap();

        let lessons = repo.list_by_course(course, &LessonWindow::default()).await.unwrap();
        let order: Vec<(i64, i64)> = lessons.iter().map(|l| (l.id, l.position)).collect();
        assert_eq!(order, vec![(c.id, 1), (a.id, 2), (b.id, 3)]);
        assert_eq!(repo.ids_for_course(course).await.unwrap(), vec![c.id, a.id, b.id]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, course) = setup().await;
        let mut lesson = add(&repo, course, "draft", 1).await;

        lesson.title = "Intro".into();
        lesson.content = "# Hello".into();
        lesson.position = 4;
        repo.update(&lesson).await.unwrap();

        let found = repo.get_by_id(lesson.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Intro");
        assert_eq!(found.position, 4);

        repo.delete(lesson.id).await.unwrap();
        assert!(repo.get_by_id(lesson.id).await.unwrap().is_none());
    }
}
