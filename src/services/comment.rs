//! Comment service

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::forms::{CommentForm, FormErrors};
use crate::models::{Comment, User};
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Post or comment does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Form input rejected
    #[error("Validation error: {0}")]
    ValidationError(FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { comments, posts }
    }

    /// Add a comment by `author` to an existing post
    pub async fn add(
        &self,
        post_id: i64,
        author: &User,
        form: &CommentForm,
    ) -> Result<Comment, CommentServiceError> {
        if self
            .posts
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .is_none()
        {
            return Err(CommentServiceError::NotFound(format!("post {}", post_id)));
        }

        let text = form.validate().map_err(CommentServiceError::ValidationError)?;
        let comment = self
            .comments
            .create(&Comment::new(post_id, author.id, text))
            .await
            .context("Failed to create comment")?;
        Ok(comment)
    }

    /// A comment that belongs to `post_id`
    pub async fn get_for_post(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Comment, CommentServiceError> {
        self.comments
            .get_for_post(post_id, comment_id)
            .await
            .context("Failed to get comment")?
            .ok_or_else(|| {
                CommentServiceError::NotFound(format!("comment {} on post {}", comment_id, post_id))
            })
    }

    /// Replace the text of `comment`
    pub async fn update(
        &self,
        comment: &Comment,
        form: &CommentForm,
    ) -> Result<Comment, CommentServiceError> {
        let text = form.validate().map_err(CommentServiceError::ValidationError)?;
        self.comments
            .update_text(comment.id, &text)
            .await
            .context("Failed to update comment")?;
        Ok(Comment {
            text,
            ..comment.clone()
        })
    }

    pub async fn delete(&self, comment_id: i64) -> Result<(), CommentServiceError> {
        if !self
            .comments
            .delete(comment_id)
            .await
            .context("Failed to delete comment")?
        {
            return Err(CommentServiceError::NotFound(format!("comment {}", comment_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CategoryRepository, SqlxCategoryRepository, SqlxCommentRepository, SqlxPostRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Category, Post, PostInput};
    use chrono::Utc;

    async fn setup() -> (CommentService, Arc<dyn CommentRepository>, User, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("commenter", "hash"))
            .await
            .unwrap();
        let category = SqlxCategoryRepository::new(pool.clone())
            .create(&Category::new("c", "", "c", true))
            .await
            .unwrap();
        let posts = SqlxPostRepository::boxed(pool.clone());
        let post = posts
            .create(&Post::new(
                user.id,
                PostInput {
                    title: "t".to_string(),
                    text: "x".to_string(),
                    pub_date: Utc::now(),
                    category_id: category.id,
                    location_id: None,
                    is_published: true,
                },
            ))
            .await
            .unwrap();

        let comments = SqlxCommentRepository::boxed(pool);
        (CommentService::new(comments.clone(), posts), comments, user, post.id)
    }

    #[tokio::test]
    async fn test_add_update_delete() {
        let (service, repo, user, post_id) = setup().await;

        let comment = service
            .add(post_id, &user, &CommentForm::new("Great read"))
            .await
            .unwrap();
        assert_eq!(comment.author_id, user.id);

        let edited = service
            .update(&comment, &CommentForm::new("Great read, thanks"))
            .await
            .unwrap();
        assert_eq!(edited.text, "Great read, thanks");
        assert_eq!(
            service.get_for_post(post_id, comment.id).await.unwrap().text,
            "Great read, thanks"
        );

        service.delete(comment.id).await.unwrap();
        assert!(repo.list_for_post(post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_comment_is_rejected_without_a_row() {
        let (service, repo, user, post_id) = setup().await;

        assert!(matches!(
            service.add(post_id, &user, &CommentForm::new("   ")).await,
            Err(CommentServiceError::ValidationError(_))
        ));
        assert!(repo.list_for_post(post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_targets() {
        let (service, _, user, post_id) = setup().await;

        assert!(matches!(
            service.add(post_id + 100, &user, &CommentForm::new("hi")).await,
            Err(CommentServiceError::NotFound(_))
        ));
        let comment = service.add(post_id, &user, &CommentForm::new("hi")).await.unwrap();
        assert!(matches!(
            service.get_for_post(post_id + 100, comment.id).await,
            Err(CommentServiceError::NotFound(_))
        ));
    }
}
