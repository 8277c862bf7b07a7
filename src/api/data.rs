use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ApiError;
use crate::dataset::{self, LoadedDataset};
use crate::domain::FileType;
use crate::repo::DatasetRow;
use crate::state::AppState;

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file_object";

/// Metadata returned for an uploaded dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRead {
    pub data_id: String,
    pub uri_path: String,
    pub data_type: String,
    pub original_name: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DatasetRow> for DataRead {
    fn from(row: DatasetRow) -> Self {
        Self {
            data_id: row.id,
            uri_path: row.uri,
            data_type: row.extension,
            original_name: row.original_name,
            size: row.size,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Accept the upload only when its declared MIME type and its extension agree
/// on one of the supported formats. A missing MIME type defers to the extension.
fn resolve_file_type(file_name: &str, content_type: Option<&str>) -> Result<FileType, ApiError> {
    let by_name = FileType::from_file_name(file_name).ok_or_else(|| {
        ApiError::UnsupportedMediaType(format!(
            "file '{file_name}' must have a .csv, .json or .xlsx extension"
        ))
    })?;
    match content_type {
        None => Ok(by_name),
        Some(mime) => match FileType::from_mime_type(mime) {
            Some(by_mime) if by_mime == by_name => Ok(by_name),
            Some(by_mime) => Err(ApiError::UnsupportedMediaType(format!(
                "content type '{mime}' ({by_mime}) does not match extension of '{file_name}'"
            ))),
            None => Err(ApiError::UnsupportedMediaType(format!(
                "content type '{mime}' is not one of csv, json, xlsx"
            ))),
        },
    }
}

/// POST /data/upload
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DataRead>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some((file_name, content_type, bytes));
        break;
    }

    let (file_name, content_type, bytes) = upload.ok_or_else(|| {
        ApiError::Unprocessable(format!("multipart field '{UPLOAD_FIELD}' is required"))
    })?;
    let file_type = resolve_file_type(&file_name, content_type.as_deref())?;
    if bytes.is_empty() {
        return Err(ApiError::Unprocessable("uploaded file is empty".to_string()));
    }

    let stored = state.store.save(&bytes, file_type).await?;
    let now = Utc::now();
    let row = DatasetRow {
        id: stored.id.to_string(),
        uri: stored.uri,
        extension: file_type.extension().to_string(),
        original_name: file_name,
        size: stored.size as i64,
        created_at: now,
        updated_at: now,
    };
    if let Err(e) = state.repos.datasets().insert(&row).await {
        if let Err(cleanup) = state.store.remove(&row.uri).await {
            warn!(uri = %row.uri, error = %cleanup, "failed to remove orphaned upload");
        }
        return Err(e.into());
    }

    info!(
        data_id = %row.id,
        original_name = %row.original_name,
        size = row.size,
        file_type = %file_type,
        "dataset uploaded"
    );
    Ok(Json(row.into()))
}

pub(crate) async fn find_dataset(state: &AppState, data_id: &str) -> Result<DatasetRow, ApiError> {
    state
        .repos
        .datasets()
        .find_by_id(data_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("dataset {data_id}")))
}

pub(crate) fn file_type_of(row: &DatasetRow) -> Result<FileType, ApiError> {
    row.extension.parse::<FileType>().map_err(|_| {
        ApiError::InternalError(format!(
            "dataset {} has unknown extension '{}'",
            row.id, row.extension
        ))
    })
}

/// Read and parse the stored file; parsing runs on the blocking pool
pub(crate) async fn load_dataset(
    state: &AppState,
    row: &DatasetRow,
) -> Result<LoadedDataset, ApiError> {
    let file_type = file_type_of(row)?;
    let bytes = state.store.read(&row.uri).await?;
    let dataset = tokio::task::spawn_blocking(move || dataset::load(&bytes, file_type)).await??;
    Ok(dataset)
}

fn content_disposition(original_name: &str) -> String {
    let safe: String = original_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

/// GET /data/{data_id}
pub async fn download(
    State(state): State<AppState>,
    Path(data_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = find_dataset(&state, &data_id).await?;
    let file_type = file_type_of(&row)?;
    let bytes = state.store.read(&row.uri).await?;
    Ok((
        [
            (header::CONTENT_TYPE, file_type.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&row.original_name)),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use rstest::rstest;

    #[rstest]
    #[case("plant.csv", Some("text/csv"), Some(FileType::Csv))]
    #[case("plant.CSV", None, Some(FileType::Csv))]
    #[case("plant.json", Some("application/json"), Some(FileType::Json))]
    #[case(
        "plant.xlsx",
        Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        Some(FileType::Excel)
    )]
    #[case("plant.txt", Some("text/csv"), None)]
    #[case("plant.csv", Some("text/plain"), None)]
    #[case("plant.csv", Some("application/json"), None)]
    #[case("plant", None, None)]
    fn test_resolve_file_type(
        #[case] name: &str,
        #[case] mime: Option<&str>,
        #[case] expected: Option<FileType>,
    ) {
        match (resolve_file_type(name, mime), expected) {
            (Ok(ft), Some(want)) => assert_eq!(ft, want),
            (Err(e), None) => assert_eq!(
                e.into_response().status(),
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            ),
            (got, want) => panic!("{name} {mime:?}: got {got:?}, want {want:?}"),
        }
    }

    #[test]
    fn test_content_disposition_escapes_quotes() {
        assert_eq!(
            content_disposition("my \"plant\".csv"),
            "attachment; filename=\"my _plant_.csv\""
        );
    }
}
