use axum::Json;
use serde::Serialize;

use crate::domain::AvailableModel;

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<AvailableModel>,
}

/// GET /models
pub async fn list_models() -> Json<ModelList> {
    Json(ModelList {
        models: AvailableModel::all(),
    })
}
