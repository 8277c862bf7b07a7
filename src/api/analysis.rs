use axum::{
    extract::{Path, Query, State},
    http::HeaderName,
    response::{Html, IntoResponse},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::data::{find_dataset, load_dataset};
use super::error::ApiError;
use super::StoredResult;
use crate::analysis::{analyze, AnalysisFilter};
use crate::charts;
use crate::repo::ResultRow;
use crate::state::AppState;

pub const ANALYSIS_ID_HEADER: HeaderName = HeaderName::from_static("x-analysis-id");

/// Query string of `GET /data/{data_id}/analysis`
#[derive(Debug, Default, Deserialize)]
pub struct AnalysisQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub object_name: Option<String>,
}

/// GET /data/{data_id}/analysis
pub async fn run_analysis(
    State(state): State<AppState>,
    Path(data_id): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = AnalysisFilter::parse(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        query.object_name.as_deref(),
    )?;
    let row = find_dataset(&state, &data_id).await?;
    let dataset = load_dataset(&state, &row).await?;

    let (report, html) = tokio::task::spawn_blocking(move || {
        let report = analyze(&dataset, &filter);
        let html = charts::analysis_html(&report);
        (report, html)
    })
    .await?;

    let results = serde_json::to_value(&report)
        .map_err(|e| ApiError::InternalError(format!("failed to serialize analysis: {e}")))?;
    let stored = ResultRow::new(&row.id, results);
    state.repos.analyses().insert(&stored).await?;

    info!(data_id = %row.id, analysis_id = %stored.id, rows = report.row_count, "analysis stored");
    Ok(([(ANALYSIS_ID_HEADER, stored.id)], Html(html)))
}

/// GET /analyses/{analysis_id}
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Result<Json<StoredResult>, ApiError> {
    let row = state
        .repos
        .analyses()
        .find_by_id(&analysis_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("analysis {analysis_id}")))?;
    Ok(Json(row.into()))
}
