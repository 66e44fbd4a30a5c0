//! Category and location models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named grouping of posts, addressed by its slug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// URL identifier (unique)
    pub slug: String,
    /// Unpublished categories hide every post they contain
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        slug: impl Into<String>,
        is_published: bool,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            description: description.into(),
            slug: slug.into(),
            is_published,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

/// A place a post can be tagged with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn new(name: impl Into<String>, is_published: bool) -> Self {
        Self {
            id: 0,
            name: name.into(),
            is_published,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLocationInput {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

fn default_true() -> bool {
    true
}
