//! Post service
//!
//! The query side answers the public feeds and the detail page; the command
//! side validates post forms and checks that referenced rows exist.

use crate::db::repositories::{
    CategoryRepository, CommentRepository, LocationRepository, PostRepository, UserRepository,
};
use crate::forms::{FormErrors, PostForm};
use crate::models::{
    Category, CommentWithAuthor, ListParams, PageNumber, PagedResult, Post, PostFilter, PostInput,
    PostSummary, User, POSTS_PER_PAGE,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post, category, author or page does not exist (or is hidden)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Form input rejected
    #[error("Validation error: {0}")]
    ValidationError(FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A post with its comment thread
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: PostSummary,
    pub comments: Vec<CommentWithAuthor>,
}

/// How out-of-range page numbers are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paging {
    Strict,
    Clamped,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    locations: Arc<dyn LocationRepository>,
    users: Arc<dyn UserRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        locations: Arc<dyn LocationRepository>,
        users: Arc<dyn UserRepository>,
        comments: Arc<dyn CommentRepository>,
    ) -> Self {
        Self {
            posts,
            categories,
            locations,
            users,
            comments,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The public feed
    pub async fn list_published(
        &self,
        page: PageNumber,
    ) -> Result<PagedResult<PostSummary>, PostServiceError> {
        self.paginate(PostFilter::published(), page, Paging::Strict, Utc::now())
            .await
    }

    /// Visible posts of a published category
    pub async fn list_by_category(
        &self,
        slug: &str,
        page: PageNumber,
    ) -> Result<(Category, PagedResult<PostSummary>), PostServiceError> {
        let category = self
            .categories
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
            .filter(|c| c.is_published)
            .ok_or_else(|| PostServiceError::NotFound(format!("category '{}'", slug)))?;

        let filter = PostFilter::published().in_category(category.id);
        let posts = self
            .paginate(filter, page, Paging::Strict, Utc::now())
            .await?;
        Ok((category, posts))
    }

    /// A user's posts. The author sees every post they wrote, drafts and
    /// scheduled ones included; everyone else sees only visible posts.
    pub async fn list_by_author(
        &self,
        username: &str,
        viewer: Option<&User>,
        page: PageNumber,
    ) -> Result<(User, PagedResult<PostSummary>), PostServiceError> {
        let author = self
            .users
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?
            .ok_or_else(|| PostServiceError::NotFound(format!("user '{}'", username)))?;

        let filter = if viewer.is_some_and(|v| v.id == author.id) {
            PostFilter::default().by_author(author.id)
        } else {
            PostFilter::published().by_author(author.id)
        };
        let posts = self
            .paginate(filter, page, Paging::Clamped, Utc::now())
            .await?;
        Ok((author, posts))
    }

    /// A post that is not scheduled for the future, with its comments oldest first
    pub async fn get_detail(&self, id: i64) -> Result<PostDetail, PostServiceError> {
        let post = self
            .posts
            .get_summary(id, Utc::now())
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(format!("post {}", id)))?;

        let comments = self
            .comments
            .list_for_post(id)
            .await
            .context("Failed to list comments")?;

        Ok(PostDetail { post, comments })
    }

    /// Raw post regardless of visibility, for ownership checks
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(format!("post {}", id)))
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Create a post owned by `author`
    pub async fn create(&self, author: &User, form: &PostForm) -> Result<Post, PostServiceError> {
        let input = self.validate(form).await?;
        let post = self
            .posts
            .create(&Post::new(author.id, input))
            .await
            .context("Failed to create post")?;

        tracing::info!(post_id = post.id, author_id = author.id, "post created");
        Ok(post)
    }

    /// Save form changes onto an existing post; the author stays the same
    pub async fn update(&self, post: &Post, form: &PostForm) -> Result<Post, PostServiceError> {
        let input = self.validate(form).await?;
        let mut updated = post.clone();
        updated.apply(input);
        self.posts
            .update(&updated)
            .await
            .context("Failed to update post")?;
        Ok(updated)
    }

    /// Delete a post and, through the foreign key, its comments
    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self
            .posts
            .delete(id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(format!("post {}", id)));
        }
        tracing::info!(post_id = id, "post deleted");
        Ok(())
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn paginate(
        &self,
        filter: PostFilter,
        page: PageNumber,
        paging: Paging,
        now: DateTime<Utc>,
    ) -> Result<PagedResult<PostSummary>, PostServiceError> {
        let total = self
            .posts
            .count(&filter, now)
            .await
            .context("Failed to count posts")?;

        let page = match paging {
            Paging::Strict => page
                .resolve_strict(total, POSTS_PER_PAGE)
                .ok_or_else(|| PostServiceError::NotFound("page".to_string()))?,
            Paging::Clamped => page.resolve_clamped(total, POSTS_PER_PAGE),
        };

        let params = ListParams::new(page, POSTS_PER_PAGE);
        let items = self
            .posts
            .list(&filter, now, &params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Form rules plus existence of the referenced category and location
    async fn validate(&self, form: &PostForm) -> Result<PostInput, PostServiceError> {
        let input = form.validate().map_err(PostServiceError::ValidationError)?;

        let mut errors = FormErrors::new();
        if self
            .categories
            .get_by_id(input.category_id)
            .await
            .context("Failed to check category")?
            .is_none()
        {
            errors.add("category", "Select a valid choice.");
        }
        if let Some(location_id) = input.location_id {
            if self
                .locations
                .get_by_id(location_id)
                .await
                .context("Failed to check location")?
                .is_none()
            {
                errors.add("location", "Select a valid choice.");
            }
        }

        errors
            .into_result(input)
            .map_err(PostServiceError::ValidationError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxCommentRepository, SqlxLocationRepository,
        SqlxPostRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Comment, Location};
    use chrono::Duration;

    struct Fixture {
        service: PostService,
        comments: Arc<dyn CommentRepository>,
        locations: Arc<dyn LocationRepository>,
        author: User,
        reader: User,
        public: Category,
        hidden: Category,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let comments = SqlxCommentRepository::boxed(pool.clone());
        let locations = SqlxLocationRepository::boxed(pool.clone());

        let author = users.create(&User::new("author", "hash")).await.unwrap();
        let reader = users.create(&User::new("reader", "hash")).await.unwrap();
        let public = categories
            .create(&Category::new("Public", "", "public", true))
            .await
            .unwrap();
        let hidden = categories
            .create(&Category::new("Hidden", "", "hidden", false))
            .await
            .unwrap();

        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            categories,
            locations.clone(),
            users,
            comments.clone(),
        );

        Fixture {
            service,
            comments,
            locations,
            author,
            reader,
            public,
            hidden,
        }
    }

    fn form(title: &str, category: &Category, minutes_ago: i64, published: bool) -> PostForm {
        PostForm {
            title: title.to_string(),
            text: "body".to_string(),
            pub_date: (Utc::now() - Duration::minutes(minutes_ago))
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            category: category.id.to_string(),
            location: String::new(),
            is_published: published.then(|| "on".to_string()),
        }
    }

    fn titles(page: &PagedResult<PostSummary>) -> Vec<&str> {
        page.items.iter().map(|p| p.post.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_index_shows_only_visible_posts() {
        let f = setup().await;
        let s = &f.service;
        s.create(&f.author, &form("visible", &f.public, 5, true)).await.unwrap();
        s.create(&f.author, &form("draft", &f.public, 5, false)).await.unwrap();
        s.create(&f.author, &form("scheduled", &f.public, -120, true)).await.unwrap();
        s.create(&f.author, &form("hidden", &f.hidden, 5, true)).await.unwrap();

        let page = s.list_published(PageNumber::default()).await.unwrap();
        assert_eq!(titles(&page), vec!["visible"]);
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_index_pagination_is_strict() {
        let f = setup().await;
        for i in 0..11 {
            f.service
                .create(&f.author, &form(&format!("p{}", i), &f.public, 100 - i, true))
                .await
                .unwrap();
        }

        let first = f.service.list_published(PageNumber::Number(1)).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert!(first.has_next());
        let last = f.service.list_published(PageNumber::Last).await.unwrap();
        assert_eq!(titles(&last), vec!["p0"]);
        assert!(matches!(
            f.service.list_published(PageNumber::Number(3)).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_category_feed() {
        let f = setup().await;
        f.service.create(&f.author, &form("in-public", &f.public, 5, true)).await.unwrap();

        let (category, page) = f
            .service
            .list_by_category("public", PageNumber::default())
            .await
            .unwrap();
        assert_eq!(category.id, f.public.id);
        assert_eq!(titles(&page), vec!["in-public"]);

        for slug in ["hidden", "missing"] {
            assert!(matches!(
                f.service.list_by_category(slug, PageNumber::default()).await,
                Err(PostServiceError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_profile_feed_depends_on_viewer() {
        let f = setup().await;
        f.service.create(&f.author, &form("shown", &f.public, 5, true)).await.unwrap();
        f.service.create(&f.author, &form("draft", &f.public, 10, false)).await.unwrap();

        let (_, own) = f
            .service
            .list_by_author("author", Some(&f.author), PageNumber::default())
            .await
            .unwrap();
        assert_eq!(titles(&own), vec!["shown", "draft"]);

        let (_, public) = f
            .service
            .list_by_author("author", Some(&f.reader), PageNumber::Number(99))
            .await
            .unwrap();
        assert_eq!(titles(&public), vec!["shown"]);
        assert_eq!(public.page, 1);

        let (_, anonymous) = f
            .service
            .list_by_author("author", None, PageNumber::default())
            .await
            .unwrap();
        assert_eq!(anonymous.total, 1);

        assert!(matches!(
            f.service.list_by_author("ghost", None, PageNumber::default()).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_detail_hides_future_posts() {
        let f = setup().await;
        let current = f.service.create(&f.author, &form("now", &f.public, 5, true)).await.unwrap();
        let future = f
            .service
            .create(&f.author, &form("later", &f.public, -60, true))
            .await
            .unwrap();
        f.comments
            .create(&Comment::new(current.id, f.reader.id, "first!"))
            .await
            .unwrap();

        let detail = f.service.get_detail(current.id).await.unwrap();
        assert_eq!(detail.post.post.title, "now");
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].author_username, "reader");

        assert!(matches!(
            f.service.get_detail(future.id).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(f.service.get(future.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_checks_references() {
        let f = setup().await;
        let mut bad = form("x", &f.public, 5, true);
        bad.category = "999".to_string();
        bad.location = "999".to_string();

        match f.service.create(&f.author, &bad).await {
            Err(PostServiceError::ValidationError(errors)) => {
                assert!(errors.has("category"));
                assert!(errors.has("location"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|p| p.id)),
        }
    }

    #[tokio::test]
    async fn test_update_keeps_author_and_delete_removes() {
        let f = setup().await;
        let post = f.service.create(&f.author, &form("before", &f.public, 5, true)).await.unwrap();

        let updated = f
            .service
            .update(&post, &form("after", &f.public, 5, false))
            .await
            .unwrap();
        assert_eq!(updated.author_id, f.author.id);
        assert_eq!(f.service.get(post.id).await.unwrap().title, "after");

        f.service.delete(post.id).await.unwrap();
        assert!(matches!(
            f.service.get(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.delete(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_location_is_joined() {
        let f = setup().await;
        let island = f.locations.create(&Location::new("Island", true)).await.unwrap();
        let mut with_location = form("located", &f.public, 5, true);
        with_location.location = island.id.to_string();

        let post = f.service.create(&f.author, &with_location).await.unwrap();
        let detail = f.service.get_detail(post.id).await.unwrap();
        assert_eq!(detail.post.location_name.as_deref(), Some("Island"));
    }
}
