//! Tabular dataset ingestion
//!
//! Uploaded files arrive as CSV, JSON or Excel. This module turns the raw
//! bytes into [`Observation`] rows (with locale-aware numeric coercion) and
//! aligns them onto an hourly grid for the forecasting pipeline.

pub mod cleaning;
pub mod coerce;
pub mod loader;

pub use cleaning::{interpolate_gaps, HourlyFrame};
pub use loader::load;

use crate::domain::Observation;

/// Dataset loading and cleaning errors
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel parse error: {0}")]
    Excel(String),

    #[error("Unsupported JSON layout: {0}")]
    JsonLayout(String),

    #[error("Required column '{0}' is missing")]
    MissingColumn(&'static str),

    #[error("File contains no data rows")]
    Empty,

    #[error("Observations span {hours} hours from {start} to {end}, limit is {max}")]
    SpanTooLong {
        start: chrono::NaiveDateTime,
        end: chrono::NaiveDateTime,
        hours: i64,
        max: usize,
    },
}

/// A parsed upload: the normalized header plus one [`Observation`] per row
#[derive(Debug, Clone, Default)]
pub struct LoadedDataset {
    pub columns: Vec<String>,
    pub observations: Vec<Observation>,
}

impl LoadedDataset {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail with the first of `names` that the header lacks
    pub fn require_columns(&self, names: &[&'static str]) -> Result<(), DatasetError> {
        match names.iter().find(|n| !self.has_column(n)) {
            Some(missing) => Err(DatasetError::MissingColumn(missing)),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
