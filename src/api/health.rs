use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::time::Instant;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    database: ComponentHealth,
    storage: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            latency_ms: None,
            error: Some(error),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET /health
///
/// `status` is `ok` when the database answers and the storage root is a
/// directory, `degraded` (with 503) otherwise.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let database = match state.repos.ping().await {
        Ok(()) => ComponentHealth::healthy(start.elapsed().as_millis() as u64),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    };
    let storage = check_storage(&state).await;

    let all_healthy = database.is_ok() && storage.is_ok();
    let response = HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now(),
        checks: HealthChecks { database, storage },
    };
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(
        duration_ms = start.elapsed().as_millis() as u64,
        healthy = all_healthy,
        "Health check completed"
    );
    (status_code, Json(response))
}

async fn check_storage(state: &AppState) -> ComponentHealth {
    let root = state.store.root();
    let start = Instant::now();
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => ComponentHealth::healthy(start.elapsed().as_millis() as u64),
        Ok(_) => ComponentHealth::unhealthy(format!("{} is not a directory", root.display())),
        Err(e) => ComponentHealth::unhealthy(format!("{}: {e}", root.display())),
    }
}
