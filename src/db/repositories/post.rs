//! Post repository
//!
//! Listing queries always join the author, category and location rows and
//! evaluate the visibility predicate in SQL against a caller-supplied `now`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostFilter, PostSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Read model for one post whose `pub_date` is not after `now`
    async fn get_summary(&self, id: i64, now: DateTime<Utc>) -> Result<Option<PostSummary>>;

    /// Persist editable fields; author and creation time are left alone
    async fn update(&self, post: &Post) -> Result<()>;

    /// Delete a post; its comments go with it
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self, filter: &PostFilter, now: DateTime<Utc>) -> Result<i64>;

    /// One page of posts, newest `pub_date` first
    async fn list(
        &self,
        filter: &PostFilter,
        now: DateTime<Utc>,
        params: &ListParams,
    ) -> Result<Vec<PostSummary>>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const POST_COLUMNS: &str =
    "id, title, text, pub_date, author_id, category_id, location_id, is_published, created_at";

const SUMMARY_SELECT: &str = r#"
    SELECT p.id, p.title, p.text, p.pub_date, p.author_id, p.category_id, p.location_id,
           p.is_published, p.created_at,
           u.username AS author_username,
           c.title AS category_title,
           c.slug AS category_slug,
           c.is_published AS category_is_published,
           l.name AS location_name,
           l.is_published AS location_is_published,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

/// WHERE clause for a filter. Placeholders appear in the order
/// `now`, `category_id`, `author_id`; absent filters add nothing.
fn where_clause(filter: &PostFilter) -> String {
    let mut conditions = Vec::new();
    if filter.visible_only {
        conditions.push("p.is_published = 1 AND p.pub_date <= ? AND c.is_published = 1");
    }
    if filter.category_id.is_some() {
        conditions.push("p.category_id = ?");
    }
    if filter.author_id.is_some() {
        conditions.push("p.author_id = ?");
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn count_sql(filter: &PostFilter) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM posts p JOIN categories c ON c.id = p.category_id {}",
        where_clause(filter)
    )
}

fn list_sql(filter: &PostFilter) -> String {
    format!(
        "{} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
        SUMMARY_SELECT,
        where_clause(filter)
    )
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await?,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await?,
        };
        Ok(Post { id, ..post.clone() })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_summary(&self, id: i64, now: DateTime<Utc>) -> Result<Option<PostSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_summary_sqlite(self.pool.sqlite()?, id, now).await,
            DatabaseDriver::Mysql => get_summary_mysql(self.pool.mysql()?, id, now).await,
        }
    }

    async fn update(&self, post: &Post) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM posts WHERE id = ?";
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
        .context("Failed to delete post")?;
        Ok(affected > 0)
    }

    async fn count(&self, filter: &PostFilter, now: DateTime<Utc>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_posts_sqlite(self.pool.sqlite()?, filter, now).await,
            DatabaseDriver::Mysql => count_posts_mysql(self.pool.mysql()?, filter, now).await,
        }
    }

    async fn list(
        &self,
        filter: &PostFilter,
        now: DateTime<Utc>,
        params: &ListParams,
    ) -> Result<Vec<PostSummary>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_posts_sqlite(self.pool.sqlite()?, filter, now, params).await
            }
            DatabaseDriver::Mysql => list_posts_mysql(self.pool.mysql()?, filter, now, params).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, pub_date, author_id, category_id, location_id, is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(post.location_id)
    .bind(post.is_published)
    .bind(post.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(result.last_insert_rowid())
}

async fn get_post_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    Ok(row.map(|row| row_to_post_sqlite(&row)))
}

async fn get_summary_sqlite(
    pool: &SqlitePool,
    id: i64,
    now: DateTime<Utc>,
) -> Result<Option<PostSummary>> {
    let sql = format!("{} WHERE p.id = ? AND p.pub_date <= ?", SUMMARY_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(now)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary")?;

    Ok(row.map(|row| row_to_summary_sqlite(&row)))
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, pub_date = ?, category_id = ?, location_id = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.category_id)
    .bind(post.location_id)
    .bind(post.is_published)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(())
}

async fn count_posts_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    now: DateTime<Utc>,
) -> Result<i64> {
    let sql = count_sql(filter);
    let mut query = sqlx::query(&sql);
    if filter.visible_only {
        query = query.bind(now);
    }
    if let Some(category_id) = filter.category_id {
        query = query.bind(category_id);
    }
    if let Some(author_id) = filter.author_id {
        query = query.bind(author_id);
    }

    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    now: DateTime<Utc>,
    params: &ListParams,
) -> Result<Vec<PostSummary>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql);
    if filter.visible_only {
        query = query.bind(now);
    }
    if let Some(category_id) = filter.category_id {
        query = query.bind(category_id);
    }
    if let Some(author_id) = filter.author_id {
        query = query.bind(author_id);
    }

    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    Ok(rows.iter().map(row_to_summary_sqlite).collect())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        location_id: row.get("location_id"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}

fn row_to_summary_sqlite(row: &sqlx::sqlite::SqliteRow) -> PostSummary {
    PostSummary {
        post: row_to_post_sqlite(row),
        author_username: row.get("author_username"),
        category_title: row.get("category_title"),
        category_slug: row.get("category_slug"),
        category_is_published: row.get("category_is_published"),
        location_name: row.get("location_name"),
        location_is_published: row.get("location_is_published"),
        comment_count: row.get("comment_count"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, pub_date, author_id, category_id, location_id, is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(post.location_id)
    .bind(post.is_published)
    .bind(post.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(result.last_insert_id() as i64)
}

async fn get_post_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    Ok(row.map(|row| row_to_post_mysql(&row)))
}

async fn get_summary_mysql(
    pool: &MySqlPool,
    id: i64,
    now: DateTime<Utc>,
) -> Result<Option<PostSummary>> {
    let sql = format!("{} WHERE p.id = ? AND p.pub_date <= ?", SUMMARY_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(now)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary")?;

    Ok(row.map(|row| row_to_summary_mysql(&row)))
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, pub_date = ?, category_id = ?, location_id = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.category_id)
    .bind(post.location_id)
    .bind(post.is_published)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(())
}

async fn count_posts_mysql(pool: &MySqlPool, filter: &PostFilter, now: DateTime<Utc>) -> Result<i64> {
    let sql = count_sql(filter);
    let mut query = sqlx::query(&sql);
    if filter.visible_only {
        query = query.bind(now);
    }
    if let Some(category_id) = filter.category_id {
        query = query.bind(category_id);
    }
    if let Some(author_id) = filter.author_id {
        query = query.bind(author_id);
    }

    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    filter: &PostFilter,
    now: DateTime<Utc>,
    params: &ListParams,
) -> Result<Vec<PostSummary>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql);
    if filter.visible_only {
        query = query.bind(now);
    }
    if let Some(category_id) = filter.category_id {
        query = query.bind(category_id);
    }
    if let Some(author_id) = filter.author_id {
        query = query.bind(author_id);
    }

    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    Ok(rows.iter().map(row_to_summary_mysql).collect())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        location_id: row.get("location_id"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}

fn row_to_summary_mysql(row: &sqlx::mysql::MySqlRow) -> PostSummary {
    PostSummary {
        post: row_to_post_mysql(row),
        author_username: row.get("author_username"),
        category_title: row.get("category_title"),
        category_slug: row.get("category_slug"),
        category_is_published: row.get("category_is_published"),
        location_name: row.get("location_name"),
        location_is_published: row.get("location_is_published"),
        comment_count: row.get("comment_count"),
    }
}
