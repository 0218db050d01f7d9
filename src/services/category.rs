//! Category service
//!
//! Categories are a flat list of unique names. The full list is read on most
//! page loads, so it is cached and invalidated on every write.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use crate::services::validation::FieldError;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY_CATEGORY_LIST: &str = "categories:all";

/// Longest accepted category name
const MAX_NAME_LENGTH: usize = 100;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("{0}")]
    ValidationError(#[from] FieldError),

    #[error("Category name already exists: {0}")]
    DuplicateName(String),

    #[error("Category not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<MemoryCache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        self.ensure_name_free(&name, None).await?;

        let category = self
            .repo
            .create(&Category::new(name, clean_description(input.description)))
            .await
            .context("Failed to create category")?;

        self.invalidate_cache().await;
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or(CategoryServiceError::NotFound)
    }

    /// All categories ordered by name (cached)
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Some(list) = self
            .cache
            .get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST)
            .await
            .ok()
            .flatten()
        {
            return Ok(list);
        }

        let list = self.repo.list().await.context("Failed to list categories")?;
        let _ = self.cache.set(CACHE_KEY_CATEGORY_LIST, &list, self.cache_ttl).await;
        Ok(list)
    }

    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> Result<Category, CategoryServiceError> {
        let mut category = self.get_by_id(id).await?;

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            self.ensure_name_free(&name, Some(id)).await?;
            category.name = name;
        }
        if input.description.is_some() {
            category.description = clean_description(input.description);
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;
        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a category. Its courses stay, uncategorized.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        self.get_by_id(id).await?;
        let orphaned = self
            .repo
            .count_courses(id)
            .await
            .context("Failed to count category courses")?;
        self.repo.delete(id).await.context("Failed to delete category")?;

        self.invalidate_cache().await;
        if orphaned > 0 {
            let _ = self.cache.delete_pattern("course:*").await;
        }
        tracing::info!(category_id = id, orphaned, "Category deleted");
        Ok(())
    }

    /// Whether a category id refers to an existing category
    pub async fn exists(&self, id: i64) -> Result<bool, CategoryServiceError> {
        Ok(self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .is_some())
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i64>) -> Result<(), CategoryServiceError> {
        let existing = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check category name")?;
        match existing {
            Some(c) if Some(c.id) != except => Err(CategoryServiceError::DuplicateName(name.to_string())),
            _ => Ok(()),
        }
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete(CACHE_KEY_CATEGORY_LIST).await;
    }
}

fn validate_name(name: &str) -> Result<String, FieldError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FieldError::new("name", "Category name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(FieldError::new(
            "name",
            format!("Category name cannot exceed {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(name.to_string())
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
