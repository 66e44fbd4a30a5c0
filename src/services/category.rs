//! Category and location services
//!
//! Categories and locations are editorial data: they are created by the
//! fixtures loader or a superuser and only read by the public pages.

use crate::db::repositories::{CategoryRepository, LocationRepository};
use crate::models::{Category, CreateCategoryInput, CreateLocationInput, Location};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

const TITLE_MAX: usize = 256;
const SLUG_MAX: usize = 64;

static SLUG_RE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$"));

/// Error types for category and location operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category slug already exists
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Check a slug against `^[-a-zA-Z0-9_]+$`
pub fn validate_slug(slug: &str) -> Result<(), CategoryServiceError> {
    let re = SLUG_RE
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Regex error: {}", e))?;

    if !re.is_match(slug) {
        return Err(CategoryServiceError::ValidationError(format!(
            "Slug '{}' may contain only latin letters, digits, hyphens and underscores",
            slug
        )));
    }
    if slug.len() > SLUG_MAX {
        return Err(CategoryServiceError::ValidationError(format!(
            "Slug must be at most {} characters",
            SLUG_MAX
        )));
    }
    Ok(())
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` for an empty title or a malformed slug
    /// - `DuplicateSlug` if the slug is already used
    pub async fn create(
        &self,
        input: CreateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let title = input.title.trim();
        if title.is_empty() || title.chars().count() > TITLE_MAX {
            return Err(CategoryServiceError::ValidationError(format!(
                "Title must be 1 to {} characters",
                TITLE_MAX
            )));
        }
        validate_slug(&input.slug)?;

        if self
            .repo
            .get_by_slug(&input.slug)
            .await
            .context("Failed to check slug uniqueness")?
            .is_some()
        {
            return Err(CategoryServiceError::DuplicateSlug(input.slug));
        }

        let category = Category::new(title, input.description, input.slug, input.is_published);
        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;
        Ok(created)
    }

    /// Every category, hidden ones included, for the post form
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list().await.context("Failed to list categories")?)
    }
}

/// Location service
pub struct LocationService {
    repo: Arc<dyn LocationRepository>,
}

impl LocationService {
    pub fn new(repo: Arc<dyn LocationRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        input: CreateLocationInput,
    ) -> Result<Location, CategoryServiceError> {
        let name = input.name.trim();
        if name.is_empty() || name.chars().count() > TITLE_MAX {
            return Err(CategoryServiceError::ValidationError(format!(
                "Location name must be 1 to {} characters",
                TITLE_MAX
            )));
        }

        let created = self
            .repo
            .create(&Location::new(name, input.is_published))
            .await
            .context("Failed to create location")?;
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<Location>, CategoryServiceError> {
        Ok(self.repo.list().await.context("Failed to list locations")?)
    }
}
