//! Exploratory analysis of an uploaded dataset
//!
//! Produces the aggregates behind the analysis page: a correlation matrix of
//! the numeric columns, hour × day-of-year surfaces for temperature and
//! generation, the raw plan/fact series and its daily means.

pub mod stats;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use tracing::info;

use crate::dataset::coerce::parse_datetime;
use crate::dataset::LoadedDataset;
use crate::domain::{NumericColumn, Observation};
use stats::{pearson, MeanPivot};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid filter '{field}': {value}")]
    InvalidFilter { field: &'static str, value: String },

    #[error("start_date {start} is after end_date {end}")]
    InvertedRange { start: NaiveDateTime, end: NaiveDateTime },
}

/// Row selection applied before any aggregate is computed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFilter {
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub object_name: Option<String>,
}

fn parse_bound(
    field: &'static str,
    raw: Option<&str>,
    end_of_day: bool,
) -> Result<Option<NaiveDateTime>, AnalysisError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    // A bare end date covers that whole day
    if end_of_day {
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(Some(day.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default())));
        }
    }
    parse_datetime(raw)
        .map(Some)
        .ok_or_else(|| AnalysisError::InvalidFilter { field, value: raw.to_string() })
}

impl AnalysisFilter {
    /// Build from raw query values
    pub fn parse(
        start_date: Option<&str>,
        end_date: Option<&str>,
        object_name: Option<&str>,
    ) -> Result<Self, AnalysisError> {
        let start = parse_bound("start_date", start_date, false)?;
        let end = parse_bound("end_date", end_date, true)?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AnalysisError::InvertedRange { start, end });
            }
        }
        Ok(Self {
            start_date: start,
            end_date: end,
            object_name: object_name
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        let Some(date) = obs.date else {
            return false;
        };
        if self.start_date.is_some_and(|s| date < s) || self.end_date.is_some_and(|e| date > e) {
            return false;
        }
        match &self.object_name {
            Some(name) => obs.object_name.as_deref() == Some(name.as_str()),
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.object_name.is_none()
    }
}

/// Pairwise Pearson correlations; `None` where undefined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Mean of a column per hour of day (rows) and day of year (columns)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourDaySurface {
    pub hours: Vec<u32>,
    pub days_of_year: Vec<u32>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl From<MeanPivot> for HourDaySurface {
    fn from(p: MeanPivot) -> Self {
        Self {
            hours: p.rows,
            days_of_year: p.columns,
            values: p.cells,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanFactSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub plan: Vec<Option<f64>>,
    pub fact: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyPlanFact {
    pub days: Vec<NaiveDate>,
    pub plan: Vec<Option<f64>>,
    pub fact: Vec<Option<f64>>,
}

/// Everything the analysis page renders; stored as the analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub filter: AnalysisFilter,
    pub row_count: usize,
    pub correlation: CorrelationMatrix,
    pub temperature_surface: HourDaySurface,
    pub generation_surface: HourDaySurface,
    pub plan_fact: PlanFactSeries,
    pub daily_plan_fact: DailyPlanFact,
}

fn correlation_matrix(rows: &[&Observation]) -> CorrelationMatrix {
    let columns: Vec<NumericColumn> = NumericColumn::iter().collect();
    let series: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|col| rows.iter().map(|o| col.value(o)).collect())
        .collect();
    let values = series
        .iter()
        .map(|a| series.iter().map(|b| pearson(a, b)).collect())
        .collect();
    CorrelationMatrix {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        values,
    }
}

fn surface(rows: &[&Observation], column: NumericColumn) -> MeanPivot {
    MeanPivot::build(rows.iter().filter_map(|o| {
        let date = o.date?;
        Some((date.hour(), date.ordinal(), column.value(o)))
    }))
}

fn plan_fact(rows: &[&Observation]) -> PlanFactSeries {
    let mut series = PlanFactSeries::default();
    for o in rows {
        if let Some(date) = o.date {
            series.timestamps.push(date);
            series.plan.push(o.plan);
            series.fact.push(o.fact);
        }
    }
    series
}

fn is_zero_or_missing(v: Option<f64>) -> bool {
    v.map_or(true, |v| v == 0.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Calendar-day means over rows where plan or fact is non-zero.
///
/// Days between the first and last kept row with no data appear as gaps.
fn daily_plan_fact(rows: &[&Observation]) -> DailyPlanFact {
    let mut by_day: BTreeMap<NaiveDate, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for o in rows {
        let Some(date) = o.date else { continue };
        if is_zero_or_missing(o.plan) && is_zero_or_missing(o.fact) {
            continue;
        }
        let entry = by_day.entry(date.date()).or_default();
        entry.0.extend(o.plan);
        entry.1.extend(o.fact);
    }

    let mut out = DailyPlanFact::default();
    let (Some(first), Some(last)) = (
        by_day.keys().next().copied(),
        by_day.keys().next_back().copied(),
    ) else {
        return out;
    };
    for day in first.iter_days().take_while(|d| *d <= last) {
        let (plan, fact) = by_day
            .get(&day)
            .map(|(p, f)| (mean(p), mean(f)))
            .unwrap_or((None, None));
        out.days.push(day);
        out.plan.push(plan);
        out.fact.push(fact);
    }
    out
}

/// Compute every aggregate of the analysis page over the filtered rows
pub fn analyze(dataset: &LoadedDataset, filter: &AnalysisFilter) -> AnalysisReport {
    let mut rows: Vec<&Observation> = dataset
        .observations
        .iter()
        .filter(|o| filter.matches(o))
        .collect();
    rows.sort_by_key(|o| o.date);

    let report = AnalysisReport {
        filter: filter.clone(),
        row_count: rows.len(),
        correlation: correlation_matrix(&rows),
        temperature_surface: surface(&rows, NumericColumn::Temperature).fill(0.0).into(),
        generation_surface: surface(&rows, NumericColumn::Fact).into(),
        plan_fact: plan_fact(&rows),
        daily_plan_fact: daily_plan_fact(&rows),
    };
    info!(
        rows = report.row_count,
        total = dataset.len(),
        filtered = !filter.is_empty(),
        days = report.daily_plan_fact.days.len(),
        "analysis computed"
    );
    report
}
