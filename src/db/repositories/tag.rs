//! Tag repository

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Case-insensitive lookup by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// Every tag with its course count, most used first
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Tags of one course ordered by name
    async fn get_for_course(&self, course_id: i64) -> Result<Vec<Tag>>;

    /// Replace the tag set of a course
    async fn set_for_course(&self, course_id: i64, tag_ids: &[i64]) -> Result<()>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            slug: row.slug,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagCountRow {
    id: i64,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
    course_count: i64,
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
                .bind(&tag.name)
                .bind(&tag.slug)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to insert tag")?
                .inserted_id()
        });
        Ok(Tag {
            id,
            created_at: now,
            ..tag.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, TagRow>("SELECT id, name, slug, created_at FROM tags WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag")?
        });
        Ok(row.map(Tag::from))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, TagRow>(
                "SELECT id, name, slug, created_at FROM tags WHERE LOWER(name) = LOWER(?)",
            )
            .bind(name)
            .fetch_optional(pool)
            .await
            .context("Failed to get tag by name")?
        });
        Ok(row.map(Tag::from))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, TagRow>("SELECT id, name, slug, created_at FROM tags WHERE slug = ?")
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag by slug")?
        });
        Ok(row.map(Tag::from))
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let sql = "SELECT t.id, t.name, t.slug, t.created_at, COUNT(ct.course_id) AS course_count \
                   FROM tags t LEFT JOIN course_tags ct ON ct.tag_id = t.id \
                   GROUP BY t.id, t.name, t.slug, t.created_at \
                   ORDER BY course_count DESC, t.name";
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, TagCountRow>(sql)
                .fetch_all(pool)
                .await
                .context("Failed to list tags")?
        });
        Ok(rows
            .into_iter()
            .map(|row| TagWithCount {
                tag: Tag {
                    id: row.id,
                    name: row.name,
                    slug: row.slug,
                    created_at: row.created_at,
                },
                course_count: row.course_count,
            })
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete tag")?
                .rows_affected()
        });
        Ok(())
    }

    async fn get_for_course(&self, course_id: i64) -> Result<Vec<Tag>> {
        let sql = "SELECT t.id, t.name, t.slug, t.created_at FROM tags t \
                   INNER JOIN course_tags ct ON ct.tag_id = t.id \
                   WHERE ct.course_id = ? ORDER BY t.name";
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, TagRow>(sql)
                .bind(course_id)
                .fetch_all(pool)
                .await
                .context("Failed to get course tags")?
        });
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn set_for_course(&self, course_id: i64, tag_ids: &[i64]) -> Result<()> {
        with_pool!(self.pool, |pool| {
            let mut tx = pool.begin().await?;
            sqlx::query("DELETE FROM course_tags WHERE course_id = ?")
                .bind(course_id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear course tags")?;
            for tag_id in tag_ids {
                sqlx::query("INSERT INTO course_tags (course_id, tag_id) VALUES (?, ?)")
                    .bind(course_id)
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to attach tag")?;
            }
            tx.commit().await?
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, SqlxTagRepository, i64) {
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
        (pool.clone(), SqlxTagRepository::new(pool), course)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (_pool, repo, _) = setup().await;
        let tag = repo.create(&Tag::new("Web Dev".into(), "web-dev".into())).await.unwrap();

        assert_eq!(repo.get_by_name("web dev").await.unwrap().unwrap().id, tag.id);
        assert_eq!(repo.get_by_slug("web-dev").await.unwrap().unwrap().id, tag.id);
        assert!(repo.get_by_id(tag.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_for_course_replaces_tags() {
        let (_pool, repo, course) = setup().await;
        let a = repo.create(&Tag::new("a".into(), "a".into())).await.unwrap();
        let b = repo.create(&Tag::new("b".into(), "b".into())).await.unwrap();
        let c = repo.create(&Tag::new("c".into(), "c".into())).await.unwrap();

        repo.set_for_course(course, &[a.id, b.id]).await.unwrap();
        repo.set_for_course(course, &[b.id, c.id]).await.unwrap();

        let names: Vec<String> = repo
            .get_for_course(course)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_list_with_counts() {
        let (_pool, repo, course) = setup().await;
        let used = repo.create(&Tag::new("used".into(), "used".into())).await.unwrap();
        repo.create(&Tag::new("idle".into(), "idle".into())).await.unwrap();
        repo.set_for_course(course, &[used.id]).await.unwrap();

        let tags = repo.list_with_counts().await.unwrap();
        assert_eq!(tags[0].tag.name, "used");
        assert_eq!(tags[0].course_count, 1);
        assert_eq!(tags[1].course_count, 0);
    }
}
