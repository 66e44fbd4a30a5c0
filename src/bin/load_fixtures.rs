//! Seed categories and locations from a YAML file.
//!
//! Usage: `cargo run --bin load-fixtures [demos/fixtures.yml]`
//!
//! Uses the same `config.yml` and `BLOGICUM_*` variables as the server.
//! Categories whose slug already exists and locations whose name already
//! exists are skipped, so the file can be loaded repeatedly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogicum::{
    config::Config,
    db::{
        self,
        repositories::{SqlxCategoryRepository, SqlxLocationRepository},
    },
    models::{CreateCategoryInput, CreateLocationInput},
    services::{CategoryService, CategoryServiceError, LocationService},
};

const DEFAULT_FIXTURES: &str = "demos/fixtures.yml";

#[derive(Debug, Default, Deserialize)]
struct Fixtures {
    #[serde(default)]
    categories: Vec<CreateCategoryInput>,
    #[serde(default)]
    locations: Vec<CreateLocationInput>,
}

fn read_fixtures(path: &Path) -> Result<Fixtures> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse fixtures: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogicum=info,load_fixtures=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FIXTURES));
    let fixtures = read_fixtures(&path)?;

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let categories = CategoryService::new(SqlxCategoryRepository::boxed(pool.clone()));
    let mut created = 0;
    for input in fixtures.categories {
        let slug = input.slug.clone();
        match categories.create(input).await {
            Ok(_) => created += 1,
            Err(CategoryServiceError::DuplicateSlug(_)) => {
                tracing::info!("Category '{}' already exists, skipped", slug);
            }
            Err(e) => return Err(e.into()),
        }
    }
    tracing::info!("Categories created: {}", created);

    let locations = LocationService::new(SqlxLocationRepository::boxed(pool));
    let existing: Vec<String> = locations
        .list()
        .await?
        .into_iter()
        .map(|l| l.name)
        .collect();
    let mut created = 0;
    for input in fixtures.locations {
        if existing.contains(&input.name) {
            tracing::info!("Location '{}' already exists, skipped", input.name);
            continue;
        }
        locations.create(input).await?;
        created += 1;
    }
    tracing::info!("Locations created: {}", created);

    Ok(())
}
