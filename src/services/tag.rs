//! Tag service
//!
//! Tags are never created on their own: attaching a tag name to a course
//! reuses the existing tag with that name (case-insensitive) or creates it.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::TagRepository;
use crate::models::{slugify, Tag, TagWithCount};
use crate::services::validation::FieldError;
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

/// Longest accepted tag name
pub const MAX_TAG_LENGTH: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("{0}")]
    ValidationError(#[from] FieldError),

    #[error("Tag not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    /// Cached courses embed their tags
    cache: Arc<MemoryCache>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    /// Every tag with its course count, most used first
    pub async fn list(&self) -> Result<Vec<TagWithCount>, TagServiceError> {
        Ok(self.repo.list_with_counts().await.context("Failed to list tags")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag")?
            .ok_or(TagServiceError::NotFound)?;
        self.repo.delete(id).await.context("Failed to delete tag")?;
        let _ = self.cache.delete_pattern("course:*").await;
        tracing::info!(tag_id = id, "Tag deleted");
        Ok(())
    }

    pub async fn for_course(&self, course_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self
            .repo
            .get_for_course(course_id)
            .await
            .context("Failed to get course tags")?)
    }

    /// Replace a course's tags with the given names, creating missing tags.
    pub async fn set_course_tags(&self, course_id: i64, names: &[String]) -> Result<Vec<Tag>, TagServiceError> {
        let tags = self.resolve(names).await?;
        let ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
        self.repo
            .set_for_course(course_id, &ids)
            .await
            .context("Failed to set course tags")?;
        Ok(tags)
    }

    /// Find or create a tag for each distinct name, in input order.
    pub async fn resolve(&self, names: &[String]) -> Result<Vec<Tag>, TagServiceError> {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();

        for name in names {
            let name = validate_tag_name(name)?;
            if !seen.insert(name.to_lowercase()) {
                continue;
            }
            tags.push(self.get_or_create(&name).await?);
        }
        Ok(tags)
    }

    async fn get_or_create(&self, name: &str) -> Result<Tag, TagServiceError> {
        if let Some(tag) = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to get tag by name")?
        {
            return Ok(tag);
        }

        let slug = self.unique_slug(name).await?;
        let tag = self
            .repo
            .create(&Tag::new(name.to_string(), slug))
            .await
            .context("Failed to create tag")?;
        tracing::debug!(tag_id = tag.id, name = %tag.name, "Tag created");
        Ok(tag)
    }

    /// Slug for a new tag; `-2`, `-3`, ... is appended while it is taken
    async fn unique_slug(&self, name: &str) -> Result<String, TagServiceError> {
        let base = match slugify(name) {
            s if s.is_empty() => "tag".to_string(),
            s => s,
        };

        let mut candidate = base.clone();
        let mut n = 2;
        while self
            .repo
            .get_by_slug(&candidate)
            .await
            .context("Failed to check tag slug")?
            .is_some()
        {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        Ok(candidate)
    }
}

fn validate_tag_name(name: &str) -> Result<String, FieldError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FieldError::new("tags", "Tag names cannot be empty"));
    }
    if name.chars().count() > MAX_TAG_LENGTH {
        return Err(FieldError::new(
            "tags",
            format!("Tag names cannot exceed {} characters", MAX_TAG_LENGTH),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxTagRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, TagService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = TagService::new(SqlxTagRepository::boxed(pool.clone()), Arc::new(MemoryCache::new()));
        (pool, service)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolve_reuses_and_dedupes() {
        let (_pool, service) = setup_test_service().await;

        let first = service.resolve(&names(&["Rust", "Web Dev"])).await.unwrap();
        let second = service.resolve(&names(&["rust", "RUST", "async"])).await.unwrap();

        assert_eq!(second.len(), 2);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(first[1].slug, "web-dev");
    }

    #[tokio::test]
    async fn test_slug_collisions_get_suffix() {
        let (_pool, service) = setup_test_service().await;

        let tags = service
            .resolve(&names(&["C++", "C#", "C"]))
            .await
            .unwrap();
        let slugs: Vec<&str> = tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c", "c-2", "c-3"]);
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(
            service.resolve(&names(&["  "])).await,
            Err(TagServiceError::ValidationError(_))
        ));
        assert!(service.resolve(&["x".repeat(51)]).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_tag() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(service.delete(42).await, Err(TagServiceError::NotFound)));
    }
}
