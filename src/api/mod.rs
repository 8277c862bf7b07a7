pub mod analysis;
pub mod data;
pub mod error;
pub mod health;
pub mod models;
pub mod predictions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::repo::ResultRow;
use crate::state::AppState;

/// A stored analysis or prediction as returned by the lookup endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: String,
    pub data_id: String,
    pub results: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ResultRow> for StoredResult {
    fn from(row: ResultRow) -> Self {
        Self {
            id: row.id,
            data_id: row.data_id,
            results: row.results.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/models", get(models::list_models))
        .route("/data/upload", post(data::upload))
        .route("/data/:data_id", get(data::download))
        .route("/data/:data_id/analysis", get(analysis::run_analysis))
        .route("/data/:data_id/predictions/run", post(predictions::run))
        .route("/analyses/:analysis_id", get(analysis::get_analysis))
        .route("/predictions/:prediction_id", get(predictions::get_prediction))
        .with_state(state);

    if cfg.server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([analysis::ANALYSIS_ID_HEADER, predictions::PREDICTION_ID_HEADER]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(cfg.server.max_upload_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
