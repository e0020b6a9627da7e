//! Data access layer. One repository per table, all sharing a SQLite pool.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub mod consumption;
pub mod devices;
pub mod predictions;

pub use consumption::ConsumptionRepository;
pub use devices::DeviceRepository;
pub use predictions::PredictionRepository;

pub struct Repositories {
    pub pool: SqlitePool,
    pub devices: DeviceRepository,
    pub consumption: ConsumptionRepository,
    pub predictions: PredictionRepository,
}

impl Repositories {
    /// Connect to the database, creating the file and schema as needed.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // In-memory databases exist per connection; a single connection keeps
        // every query on the same database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        migrate(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            devices: DeviceRepository::new(pool.clone()),
            consumption: ConsumptionRepository::new(pool.clone()),
            predictions: PredictionRepository::new(pool.clone()),
            pool,
        }
    }
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
