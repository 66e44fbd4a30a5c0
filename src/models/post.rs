//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blog post as stored.
///
/// `author_id` is fixed at creation; updates never rewrite it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// Publication time; a post is hidden from every listing until then
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub category_id: i64,
    pub location_id: Option<i64>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Build an unsaved post owned by `author_id`
    pub fn new(author_id: i64, input: PostInput) -> Self {
        Self {
            id: 0,
            title: input.title,
            text: input.text,
            pub_date: input.pub_date,
            author_id,
            category_id: input.category_id,
            location_id: input.location_id,
            is_published: input.is_published,
            created_at: Utc::now(),
        }
    }

    /// Copy validated form fields onto this post, leaving ownership untouched
    pub fn apply(&mut self, input: PostInput) {
        self.title = input.title;
        self.text = input.text;
        self.pub_date = input.pub_date;
        self.category_id = input.category_id;
        self.location_id = input.location_id;
        self.is_published = input.is_published;
    }
}

/// Validated, user-editable post fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub category_id: i64,
    pub location_id: Option<i64>,
    pub is_published: bool,
}

/// Read model for listings and the detail page: a post plus the columns
/// joined from its author, category and location, and its comment count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub category_title: String,
    pub category_slug: String,
    pub category_is_published: bool,
    pub location_name: Option<String>,
    pub location_is_published: Option<bool>,
    pub comment_count: i64,
}

impl PostSummary {
    /// `is_published ∧ pub_date ≤ now ∧ category.is_published`
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.post.is_published && self.post.pub_date <= now && self.category_is_published
    }
}

/// Which posts a listing query should return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Apply the public visibility predicate
    pub visible_only: bool,
}

impl PostFilter {
    /// Posts any visitor may see
    pub fn published() -> Self {
        Self {
            visible_only: true,
            ..Self::default()
        }
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn by_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn summary(is_published: bool, offset_minutes: i64, category_is_published: bool) -> PostSummary {
        let now = Utc::now();
        PostSummary {
            post: Post {
                id: 1,
                title: "t".to_string(),
                text: "x".to_string(),
                pub_date: now + Duration::minutes(offset_minutes),
                author_id: 1,
                category_id: 1,
                location_id: None,
                is_published,
                created_at: now,
            },
            author_username: "a".to_string(),
            category_title: "c".to_string(),
            category_slug: "c".to_string(),
            category_is_published,
            location_name: None,
            location_is_published: None,
            comment_count: 0,
        }
    }

    #[test]
    fn test_visibility_requires_all_three_conditions() {
        let now = Utc::now();
        assert!(summary(true, -5, true).is_visible_at(now));
        assert!(!summary(false, -5, true).is_visible_at(now));
        assert!(!summary(true, 5, true).is_visible_at(now));
        assert!(!summary(true, -5, false).is_visible_at(now));
    }

    proptest! {
        #[test]
        fn prop_visible_iff_published_past_and_category_published(
            is_published in any::<bool>(),
            offset_minutes in -10_000i64..10_000,
            category_is_published in any::<bool>(),
        ) {
            prop_assume!(offset_minutes != 0);
            let now = Utc::now();
            let visible = summary(is_published, offset_minutes, category_is_published).is_visible_at(now);
            prop_assert_eq!(visible, is_published && offset_minutes < 0 && category_is_published);
        }
    }

    #[test]
    fn test_apply_keeps_author() {
        let now = Utc::now();
        let input = PostInput {
            title: "Old".to_string(),
            text: "Body".to_string(),
            pub_date: now,
            category_id: 1,
            location_id: None,
            is_published: false,
        };
        let mut post = Post::new(42, input.clone());
        post.apply(PostInput {
            title: "New".to_string(),
            category_id: 2,
            ..input
        });

        assert_eq!(post.author_id, 42);
        assert_eq!(post.title, "New");
        assert_eq!(post.category_id, 2);
    }

    #[test]
    fn test_filter_builders() {
        let filter = PostFilter::published().in_category(3).by_author(9);
        assert!(filter.visible_only);
        assert_eq!(filter.category_id, Some(3));
        assert_eq!(filter.author_id, Some(9));
        assert!(!PostFilter::default().visible_only);
    }
}
