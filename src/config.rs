use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub db: DbConfig,
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub enable_cors: bool,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded files are written to
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    pub min_observations: usize,
    pub test_fraction: f64,
    /// Upper bound on the hourly grid built from one dataset
    pub max_grid_hours: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub json: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: true,
            filter: "info,hyper=warn,tower_http=info,sqlx=warn".to_string(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_observations: 30,
            test_fraction: 0.3,
            max_grid_hours: 24 * 366 * 10,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SOLAR__").split("__"));
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let test_fraction = self.forecast.test_fraction;
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            anyhow::bail!("forecast.test_fraction must be in (0, 1), got {test_fraction}");
        }
        if self.forecast.max_grid_hours == 0 {
            anyhow::bail!("forecast.max_grid_hours must be at least 1");
        }
        if self.db.max_connections == 0 {
            anyhow::bail!("db.max_connections must be at least 1");
        }
        Ok(())
    }
}
