//! Format-specific readers producing a uniform header + cell grid

use calamine::{DataType, Reader, Xlsx};
use itertools::Itertools;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Cursor;
use tracing::debug;

use super::coerce::Cell;
use super::{DatasetError, LoadedDataset};
use crate::domain::{FileType, Observation};

/// Intermediate table shared by all readers
struct RawTable {
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Parse an uploaded file into observations.
///
/// Header names are normalized (trimmed, lowercased) so `Cloudiness` and
/// `cloudiness` address the same column. Only `date` is mandatory at this
/// stage; consumers check for the columns they need.
pub fn load(bytes: &[u8], file_type: FileType) -> Result<LoadedDataset, DatasetError> {
    let table = match file_type {
        FileType::Csv => read_csv(bytes)?,
        FileType::Json => read_json(bytes)?,
        FileType::Excel => read_excel(bytes)?,
    };

    if table.rows.is_empty() {
        return Err(DatasetError::Empty);
    }

    let dataset = into_dataset(table)?;
    debug!(
        rows = dataset.len(),
        columns = ?dataset.columns,
        file_type = %file_type,
        "dataset parsed"
    );
    Ok(dataset)
}

fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

fn into_dataset(table: RawTable) -> Result<LoadedDataset, DatasetError> {
    let columns: Vec<String> = table.header.iter().map(|h| normalize_header(h)).collect();
    let index = |name: &str| columns.iter().position(|c| c == name);

    let date_idx = index("date").ok_or(DatasetError::MissingColumn("date"))?;
    let object_idx = index("object_name");
    let plan_idx = index("plan");
    let fact_idx = index("fact");
    let unit_idx = index("unit");
    let cloud_idx = index("cloudiness");
    let temp_idx = index("temperature");
    let wind_idx = index("wind_speed");

    let observations = table
        .rows
        .iter()
        .map(|row| {
            let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i));
            Observation {
                date: cell(Some(date_idx)).and_then(Cell::as_datetime),
                object_name: cell(object_idx).and_then(Cell::as_text),
                plan: cell(plan_idx).and_then(Cell::as_f64),
                fact: cell(fact_idx).and_then(Cell::as_f64),
                unit: cell(unit_idx).and_then(Cell::as_text),
                cloudiness: cell(cloud_idx).and_then(Cell::as_f64),
                temperature: cell(temp_idx).and_then(Cell::as_f64),
                wind_speed: cell(wind_idx).and_then(Cell::as_f64),
            }
        })
        .collect();

    Ok(LoadedDataset { columns, observations })
}

/// Pick `;` when the header line has more semicolons than commas
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn read_csv(bytes: &[u8]) -> Result<RawTable, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let header = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(RawTable { header, rows })
}

fn json_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        Value::String(s) if s.is_empty() => Cell::Empty,
        Value::String(s) => Cell::Text(s.clone()),
        Value::Bool(b) => Cell::Text(b.to_string()),
        Value::Array(_) | Value::Object(_) => Cell::Text(value.to_string()),
    }
}

/// Accepts `[{"col": v, ...}, ...]` (records) or `{"col": {"0": v, ...}, ...}` (columns)
fn read_json(bytes: &[u8]) -> Result<RawTable, DatasetError> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(records) => {
            let objects = records
                .iter()
                .map(|record| {
                    record.as_object().ok_or_else(|| {
                        DatasetError::JsonLayout("array elements must be objects".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            // Union of keys in first-seen order
            let header: Vec<String> = objects
                .iter()
                .flat_map(|obj| obj.keys().cloned())
                .unique()
                .collect();
            let rows = objects
                .iter()
                .map(|obj| {
                    header
                        .iter()
                        .map(|key| obj.get(key).map(json_cell).unwrap_or(Cell::Empty))
                        .collect()
                })
                .collect();
            Ok(RawTable { header, rows })
        }
        Value::Object(columns) => {
            let mut row_keys: BTreeSet<RowKey> = BTreeSet::new();
            for (name, column) in &columns {
                let column = column.as_object().ok_or_else(|| {
                    DatasetError::JsonLayout(format!("column '{name}' must map row keys to values"))
                })?;
                for key in column.keys() {
                    row_keys.insert(RowKey::parse(key));
                }
            }
            let header: Vec<String> = columns.keys().cloned().collect();
            let rows = row_keys
                .iter()
                .map(|row_key| {
                    header
                        .iter()
                        .map(|name| {
                            columns[name]
                                .get(row_key.raw())
                                .map(json_cell)
                                .unwrap_or(Cell::Empty)
                        })
                        .collect()
                })
                .collect();
            Ok(RawTable { header, rows })
        }
        _ => Err(DatasetError::JsonLayout(
            "expected an array of records or an object of columns".to_string(),
        )),
    }
}

/// Row index of a column-oriented JSON document; numeric keys sort numerically
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum RowKey {
    Index(u64, String),
    Label(String),
}

impl RowKey {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(i) => RowKey::Index(i, raw.to_string()),
            Err(_) => RowKey::Label(raw.to_string()),
        }
    }

    fn raw(&self) -> &str {
        match self {
            RowKey::Index(_, raw) | RowKey::Label(raw) => raw,
        }
    }
}

fn excel_cell(cell: &calamine::Data) -> Cell {
    match cell {
        calamine::Data::Empty | calamine::Data::Error(_) => Cell::Empty,
        calamine::Data::Int(v) => Cell::Number(*v as f64),
        calamine::Data::Float(v) => Cell::Number(*v),
        calamine::Data::String(s) if s.trim().is_empty() => Cell::Empty,
        calamine::Data::String(s) => Cell::Text(s.clone()),
        calamine::Data::Bool(b) => Cell::Text(b.to_string()),
        calamine::Data::DateTime(_) => {
            cell.as_datetime().map(Cell::DateTime).unwrap_or(Cell::Empty)
        }
        other => other.as_string().map(Cell::Text).unwrap_or(Cell::Empty),
    }
}

fn read_excel(bytes: &[u8]) -> Result<RawTable, DatasetError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| DatasetError::Excel(format!("failed to open workbook: {e}")))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DatasetError::Excel("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| DatasetError::Excel(format!("failed to read sheet '{sheet}': {e}")))?;

    let mut rows = range
        .rows()
        .filter(|row| !row.iter().all(|c| matches!(c, calamine::Data::Empty)));

    let header = rows
        .next()
        .ok_or(DatasetError::Empty)?
        .iter()
        .map(|c| excel_cell(c).as_text().unwrap_or_default())
        .collect();

    let rows = rows.map(|row| row.iter().map(excel_cell).collect()).collect();
    Ok(RawTable { header, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const CSV: &str = "date,object_name,plan,fact,unit,cloudiness,temperature,wind_speed\n\
        2024-01-01 00:00:00,Zadarya,\"1,5\",\"1,2\",MWh,40,-2.5,3\n\
        2024-01-01 01:00:00,Zadarya,\"2,0\",,MWh,45,-2.0,4\n";

    #[test]
    fn test_read_csv_with_decimal_comma() {
        let ds = load(CSV.as_bytes(), FileType::Csv).unwrap();
        assert_eq!(ds.len(), 2);
        let first = &ds.observations[0];
        assert_eq!(first.plan, Some(1.5));
        assert_eq!(first.fact, Some(1.2));
        assert_eq!(first.temperature, Some(-2.5));
        assert_eq!(first.object_name.as_deref(), Some("Zadarya"));
        assert_eq!(ds.observations[1].fact, None);
        assert_eq!(ds.observations[1].date.unwrap().hour(), 1);
    }

    #[test]
    fn test_read_semicolon_csv_with_mixed_case_header() {
        let csv = "Date;Fact;Cloudiness;Temperature\n2024-01-01 00:00;3,5;10;1,5\n";
        let ds = load(csv.as_bytes(), FileType::Csv).unwrap();
        assert!(ds.has_column("cloudiness"));
        assert_eq!(ds.observations[0].fact, Some(3.5));
        assert_eq!(ds.observations[0].temperature, Some(1.5));
    }

    #[test]
    fn test_csv_without_date_column() {
        let err = load(b"fact,plan\n1,2\n", FileType::Csv).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn("date")));
    }

    #[test]
    fn test_csv_header_only_is_empty() {
        let err = load(b"date,fact\n", FileType::Csv).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn test_read_json_records() {
        let json = r#"[
            {"date": "2024-01-01 00:00:00", "fact": "0,5", "cloudiness": 20, "temperature": 3.5},
            {"date": "2024-01-01 01:00:00", "fact": 1.0, "cloudiness": null, "temperature": 4}
        ]"#;
        let ds = load(json.as_bytes(), FileType::Json).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.observations[0].fact, Some(0.5));
        assert_eq!(ds.observations[1].cloudiness, None);
    }

    #[test]
    fn test_read_json_columns_orders_rows_numerically() {
        let json = r#"{
            "date": {"0": 1704067200000, "10": 1704103200000, "2": 1704074400000},
            "fact": {"0": 1.0, "10": 3.0, "2": 2.0}
        }"#;
        let ds = load(json.as_bytes(), FileType::Json).unwrap();
        let facts: Vec<f64> = ds.observations.iter().filter_map(|o| o.fact).collect();
        assert_eq!(facts, vec![1.0, 2.0, 3.0]);
        assert_eq!(ds.observations[1].date.unwrap().hour(), 2);
    }

    #[test]
    fn test_read_json_rejects_scalar() {
        let err = load(b"42", FileType::Json).unwrap_err();
        assert!(matches!(err, DatasetError::JsonLayout(_)));
    }

    /// One sheet: header row, a data row, a blank row, a data row whose
    /// temperature is stored as text with a decimal comma
    const XLSX: &[u8] = include_bytes!("../../tests/fixtures/solar.xlsx");

    #[test]
    fn test_read_excel_workbook() {
        let ds = load(XLSX, FileType::Excel).unwrap();
        assert_eq!(
            ds.columns,
            vec!["date", "object_name", "fact", "cloudiness", "temperature"]
        );
        assert_eq!(ds.len(), 2);

        let first = &ds.observations[0];
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(first.date, day.and_hms_opt(0, 0, 0));
        assert_eq!(first.object_name.as_deref(), Some("plant-1"));
        assert_eq!(first.fact, Some(1.5));
        assert_eq!(first.cloudiness, Some(20.0));
        assert_eq!(first.temperature, Some(3.5));

        let second = &ds.observations[1];
        assert_eq!(second.date, day.and_hms_opt(3, 0, 0));
        assert_eq!(second.fact, Some(2.0));
        assert_eq!(second.temperature, Some(4.25));
    }

    #[test]
    fn test_read_excel_rejects_garbage() {
        let err = load(b"not a zip archive", FileType::Excel).unwrap_err();
        assert!(matches!(err, DatasetError::Excel(_)));
    }
}
