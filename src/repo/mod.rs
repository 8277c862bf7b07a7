//! SQLite persistence
//!
//! One repository per table, handed out by the [`Repositories`] facade which
//! owns the connection pool and applies the embedded migrations on connect.

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DbConfig;

pub mod datasets;
pub mod results;

pub use datasets::{DatasetRepository, DatasetRow};
pub use results::{AnalysisRepository, PredictionRepository, ResultRow};

#[derive(Clone)]
pub struct Repositories {
    pub pool: SqlitePool,
}

impl Repositories {
    pub async fn connect(cfg: &DbConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url)
            .await?;
        let repos = Self { pool };
        repos.migrate().await?;
        info!(url = %cfg.url, "database ready");
        Ok(repos)
    }

    /// Private in-memory database, used by tests and local experiments
    pub async fn in_memory() -> Result<Self> {
        // A single long-lived connection keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let repos = Self { pool };
        repos.migrate().await?;
        Ok(repos)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn datasets(&self) -> DatasetRepository<'_> {
        DatasetRepository::new(&self.pool)
    }

    pub fn analyses(&self) -> AnalysisRepository<'_> {
        AnalysisRepository::new(&self.pool)
    }

    pub fn predictions(&self) -> PredictionRepository<'_> {
        PredictionRepository::new(&self.pool)
    }
}
