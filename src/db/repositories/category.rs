//! Category repository

use super::InsertedId;
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Case-insensitive lookup by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category; its courses keep existing without one
    async fn delete(&self, id: i64) -> Result<()>;

    /// Number of courses filed under a category
    async fn count_courses(&self, id: i64) -> Result<i64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO categories (name, description, created_at) VALUES (?, ?, ?)")
                .bind(&category.name)
                .bind(&category.description)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to insert category")?
                .inserted_id()
        });
        Ok(Category {
            id,
            created_at: now,
            ..category.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, CategoryRow>(
                "SELECT id, name, description, created_at FROM categories WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get category")?
        });
        Ok(row.map(Category::from))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, CategoryRow>(
                "SELECT id, name, description, created_at FROM categories WHERE LOWER(name) = LOWER(?)",
            )
            .bind(name)
            .fetch_optional(pool)
            .await
            .context("Failed to get category by name")?
        });
        Ok(row.map(Category::from))
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let rows = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, CategoryRow>(
                "SELECT id, name, description, created_at FROM categories ORDER BY name",
            )
            .fetch_all(pool)
            .await
            .context("Failed to list categories")?
        });
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE categories SET name = ?, description = ? WHERE id = ?")
                .bind(&category.name)
                .bind(&category.description)
                .bind(category.id)
                .execute(pool)
                .await
                .context("Failed to update category")?
                .rows_affected()
        });
        Ok(category.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete category")?
                .rows_affected()
        });
        Ok(())
    }

    async fn count_courses(&self, id: i64) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE category_id = ?")
                .bind(id)
                .fetch_one(pool)
                .await
                .context("Failed to count category courses")?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_list_and_lookup() {
        let repo = setup_test_repo().await;
        repo.create(&Category::new("Science".into(), None)).await.unwrap();
        let arts = repo
            .create(&Category::new("Arts".into(), Some("Painting and music".into())))
            .await
            .unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Arts", "Science"]);

        let found = repo.get_by_name("arts").await.unwrap().unwrap();
        assert_eq!(found.id, arts.id);
        assert_eq!(repo.count_courses(arts.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&Category::new("Science".into(), None)).await.unwrap();
        assert!(repo.create(&Category::new("Science".into(), None)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut category = repo.create(&Category::new("Sci".into(), None)).await.unwrap();

        category.name = "Science".into();
        repo.update(&category).await.unwrap();
        assert_eq!(repo.get_by_id(category.id).await.unwrap().unwrap().name, "Science");

        repo.delete(category.id).await.unwrap();
        assert!(repo.get_by_id(category.id).await.unwrap().is_none());
    }
}
