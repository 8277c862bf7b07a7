use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::repo::Repositories;
use crate::storage::FileStore;

/// Shared handler state; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub repos: Arc<Repositories>,
    pub store: FileStore,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let repos = Repositories::connect(&cfg.db).await?;
        Ok(Self::with_parts(cfg, repos))
    }

    /// Assemble from an already opened database, e.g. an in-memory one
    pub fn with_parts(cfg: Config, repos: Repositories) -> Self {
        let store = FileStore::new(cfg.storage.data_dir.clone());
        Self {
            cfg: Arc::new(cfg),
            repos: Arc::new(repos),
            store,
        }
    }
}
