//! Location repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Location;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create(&self, location: &Location) -> Result<Location>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// All locations ordered by name
    async fn list(&self) -> Result<Vec<Location>>;
}

pub struct SqlxLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxLocationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LocationRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_LOCATION: &str =
    "INSERT INTO locations (name, is_published, created_at) VALUES (?, ?, ?)";

macro_rules! row_to_location {
    ($row:expr) => {
        Location {
            id: $row.get("id"),
            name: $row.get("name"),
            is_published: $row.get("is_published"),
            created_at: $row.get("created_at"),
        }
    };
}

#[async_trait]
impl LocationRepository for SqlxLocationRepository {
    async fn create(&self, location: &Location) -> Result<Location> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_LOCATION)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create location")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_LOCATION)
                .bind(&location.name)
                .bind(location.is_published)
                .bind(location.created_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create location")?
                .last_insert_id() as i64,
        };

        Ok(Location {
            id,
            ..location.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        let sql = "SELECT id, name, is_published, created_at FROM locations WHERE id = ?";
        let location = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get location")?
                .map(|row| row_to_location!(row)),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get location")?
                .map(|row| row_to_location!(row)),
        };
        Ok(location)
    }

    async fn list(&self) -> Result<Vec<Location>> {
        let sql = "SELECT id, name, is_published, created_at FROM locations ORDER BY name, id";
        let locations = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list locations")?
                .into_iter()
                .map(|row| row_to_location!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list locations")?
                .into_iter()
                .map(|row| row_to_location!(row))
                .collect(),
        };
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_create_get_list() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxLocationRepository::new(pool);

        let moscow = repo.create(&Location::new("Moscow", true)).await.unwrap();
        repo.create(&Location::new("Atlantis", false)).await.unwrap();

        let found = repo.get_by_id(moscow.id).await.unwrap().expect("missing");
        assert_eq!(found.name, "Moscow");
        assert!(found.is_published);
        assert!(repo.get_by_id(999).await.unwrap().is_none());

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Atlantis", "Moscow"]);
    }
}
