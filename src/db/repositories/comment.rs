//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithAuthor};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    /// Get a comment, only if it belongs to `post_id`
    async fn get_for_post(&self, post_id: i64, comment_id: i64) -> Result<Option<Comment>>;

    /// Thread of a post, oldest first, with author names
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;

    /// Replace a comment's text
    async fn update_text(&self, id: i64, text: &str) -> Result<()>;

    /// Delete a comment
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, comment).await?,
            DatabaseDriver::Mysql => create_mysql(self.pool.mysql()?, comment).await?,
        };
        Ok(Comment {
            id,
            ..comment.clone()
        })
    }

    async fn get_for_post(&self, post_id: i64, comment_id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_for_post_sqlite(self.pool.sqlite()?, post_id, comment_id).await
            }
            DatabaseDriver::Mysql => get_for_post_mysql(self.pool.mysql()?, post_id, comment_id).await,
        }
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_for_post_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => list_for_post_mysql(self.pool.mysql()?, post_id).await,
        }
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<()> {
        let sql = "UPDATE comments SET text = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(text)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(text)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update comment")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM comments WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete comment")?;
        Ok(affected > 0)
    }
}

const INSERT_COMMENT: &str =
    "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?, ?, ?, ?)";

const SELECT_COMMENT: &str = r#"
    SELECT id, text, post_id, author_id, created_at
    FROM comments
    WHERE id = ? AND post_id = ?
"#;

const SELECT_THREAD: &str = r#"
    SELECT cm.id, cm.text, cm.post_id, cm.author_id, cm.created_at, u.username AS author_username
    FROM comments cm
    JOIN users u ON u.id = cm.author_id
    WHERE cm.post_id = ?
    ORDER BY cm.created_at ASC, cm.id ASC
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<i64> {
    let result = sqlx::query(INSERT_COMMENT)
        .bind(&comment.text)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.created_at)
        .execute(pool)
        .await
        .context("Failed to create comment")?;
    Ok(result.last_insert_rowid())
}

async fn get_for_post_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    comment_id: i64,
) -> Result<Option<Comment>> {
    let row = sqlx::query(SELECT_COMMENT)
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.map(|row| row_to_comment_sqlite(&row)))
}

async fn list_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(SELECT_THREAD)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|row| CommentWithAuthor {
            comment: row_to_comment_sqlite(row),
            author_username: row.get("author_username"),
        })
        .collect())
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        text: row.get("text"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, comment: &Comment) -> Result<i64> {
    let result = sqlx::query(INSERT_COMMENT)
        .bind(&comment.text)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.created_at)
        .execute(pool)
        .await
        .context("Failed to create comment")?;
    Ok(result.last_insert_id() as i64)
}

async fn get_for_post_mysql(
    pool: &MySqlPool,
    post_id: i64,
    comment_id: i64,
) -> Result<Option<Comment>> {
    let row = sqlx::query(SELECT_COMMENT)
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.map(|row| row_to_comment_mysql(&row)))
}

async fn list_for_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(SELECT_THREAD)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|row| CommentWithAuthor {
            comment: row_to_comment_mysql(row),
            author_username: row.get("author_username"),
        })
        .collect())
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        text: row.get("text"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CategoryRepository, PostRepository, SqlxCategoryRepository, SqlxPostRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Category, Post, PostInput, User};
    use chrono::{Duration, Utc};

    async fn setup() -> (SqlxCommentRepository, SqlxPostRepository, i64, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let alice = users.create(&User::new("alice", "hash")).await.unwrap().id;
        let bob = users.create(&User::new("bob", "hash")).await.unwrap().id;
        let category = SqlxCategoryRepository::new(pool.clone())
            .create(&Category::new("News", "", "news", true))
            .await
            .unwrap();
        let posts = SqlxPostRepository::new(pool.clone());
        let post = posts
            .create(&Post::new(
                alice,
                PostInput {
                    title: "Hello".to_string(),
                    text: "World".to_string(),
                    pub_date: Utc::now(),
                    category_id: category.id,
                    location_id: None,
                    is_published: true,
                },
            ))
            .await
            .unwrap();

        (SqlxCommentRepository::new(pool), posts, post.id, alice, bob)
    }

    #[tokio::test]
    async fn test_thread_is_oldest_first() {
        let (repo, _, post_id, alice, bob) = setup().await;
        let mut first = Comment::new(post_id, bob, "first");
        first.created_at = Utc::now() - Duration::minutes(5);
        repo.create(&Comment::new(post_id, alice, "second")).await.unwrap();
        repo.create(&first).await.unwrap();

        let thread = repo.list_for_post(post_id).await.unwrap();
        let texts: Vec<&str> = thread.iter().map(|c| c.comment.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(thread[0].author_username, "bob");
    }

    #[tokio::test]
    async fn test_get_is_scoped_to_post() {
        let (repo, _, post_id, alice, _) = setup().await;
        let comment = repo.create(&Comment::new(post_id, alice, "hi")).await.unwrap();

        assert!(repo.get_for_post(post_id, comment.id).await.unwrap().is_some());
        assert!(repo.get_for_post(post_id + 1, comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, _, post_id, alice, _) = setup().await;
        let comment = repo.create(&Comment::new(post_id, alice, "typo")).await.unwrap();

        repo.update_text(comment.id, "fixed").await.unwrap();
        let stored = repo.get_for_post(post_id, comment.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "fixed");
        assert_eq!(stored.author_id, alice);

        assert!(repo.delete(comment.id).await.unwrap());
        assert!(repo.list_for_post(post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comments_follow_post_deletion() {
        let (repo, posts, post_id, alice, _) = setup().await;
        repo.create(&Comment::new(post_id, alice, "bye")).await.unwrap();

        posts.delete(post_id).await.unwrap();
        assert!(repo.list_for_post(post_id).await.unwrap().is_empty());
    }
}
