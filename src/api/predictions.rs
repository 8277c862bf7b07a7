use axum::{
    extract::{Path, State},
    http::{HeaderName, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use tracing::info;
use validator::Validate;

use super::data::{find_dataset, load_dataset};
use super::error::ApiError;
use super::StoredResult;
use crate::charts;
use crate::domain::PredictionConfig;
use crate::forecast::run_prediction;
use crate::repo::ResultRow;
use crate::state::AppState;

pub const PREDICTION_ID_HEADER: HeaderName = HeaderName::from_static("x-prediction-id");

/// POST /data/{data_id}/predictions/run
pub async fn run(
    State(state): State<AppState>,
    Path(data_id): Path<String>,
    Json(request): Json<PredictionConfig>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let row = find_dataset(&state, &data_id).await?;
    let dataset = load_dataset(&state, &row).await?;

    let settings = state.cfg.forecast.clone();
    let (outcome, html) = tokio::task::spawn_blocking(move || {
        let outcome = run_prediction(&dataset, &request, &settings)?;
        let html = charts::prediction_html(&outcome);
        Ok::<_, ApiError>((outcome, html))
    })
    .await??;

    let results = serde_json::to_value(&outcome)
        .map_err(|e| ApiError::InternalError(format!("failed to serialize prediction: {e}")))?;
    let stored = ResultRow::new(&row.id, results);
    state.repos.predictions().insert(&stored).await?;

    info!(
        data_id = %row.id,
        prediction_id = %stored.id,
        model = %outcome.model_type,
        horizon = outcome.forecast_horizon,
        "prediction stored"
    );
    Ok((
        StatusCode::CREATED,
        [(PREDICTION_ID_HEADER, stored.id)],
        Html(html),
    ))
}

/// GET /predictions/{prediction_id}
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(prediction_id): Path<String>,
) -> Result<Json<StoredResult>, ApiError> {
    let row = state
        .repos
        .predictions()
        .find_by_id(&prediction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("prediction {prediction_id}")))?;
    Ok(Json(row.into()))
}
