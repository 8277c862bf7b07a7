use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Accepted upload formats
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileType {
    Csv,
    Json,
    #[strum(to_string = "xlsx", serialize = "excel")]
    #[serde(rename = "xlsx", alias = "excel")]
    Excel,
}

impl FileType {
    /// File name extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Json => "json",
            FileType::Excel => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileType::Csv => "text/csv",
            FileType::Json => "application/json",
            FileType::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// Match on the final extension of `file_name`, case-insensitively
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        FileType::iter().find(|t| t.extension() == ext)
    }

    /// Match a declared content type. Parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        FileType::iter().find(|t| t.mime_type() == essence)
    }
}

/// One row of an uploaded table after numeric coercion.
///
/// Every field is optional: unparsable cells become `None` and are dropped
/// later by the cleaning step that needs them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: Option<NaiveDateTime>,
    pub object_name: Option<String>,
    pub plan: Option<f64>,
    pub fact: Option<f64>,
    pub unit: Option<String>,
    pub cloudiness: Option<f64>,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// Numeric columns of the input schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NumericColumn {
    Plan,
    Fact,
    Cloudiness,
    Temperature,
    WindSpeed,
}

impl NumericColumn {
    pub fn value(&self, obs: &Observation) -> Option<f64> {
        match self {
            NumericColumn::Plan => obs.plan,
            NumericColumn::Fact => obs.fact,
            NumericColumn::Cloudiness => obs.cloudiness,
            NumericColumn::Temperature => obs.temperature,
            NumericColumn::WindSpeed => obs.wind_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("data.csv", Some(FileType::Csv))]
    #[case("DATA.CSV", Some(FileType::Csv))]
    #[case("weather.2024.json", Some(FileType::Json))]
    #[case("plant.xlsx", Some(FileType::Excel))]
    #[case("plant.xls", None)]
    #[case("no_extension", None)]
    fn test_from_file_name(#[case] name: &str, #[case] expected: Option<FileType>) {
        assert_eq!(FileType::from_file_name(name), expected);
    }

    #[rstest]
    #[case("text/csv", Some(FileType::Csv))]
    #[case("text/csv; charset=utf-8", Some(FileType::Csv))]
    #[case("application/json", Some(FileType::Json))]
    #[case(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some(FileType::Excel)
    )]
    #[case("application/pdf", None)]
    fn test_from_mime_type(#[case] mime: &str, #[case] expected: Option<FileType>) {
        assert_eq!(FileType::from_mime_type(mime), expected);
    }

    #[test]
    fn test_file_type_serde() {
        assert_eq!(serde_json::to_string(&FileType::Excel).unwrap(), "\"xlsx\"");
        let legacy: FileType = serde_json::from_str("\"excel\"").unwrap();
        assert_eq!(legacy, FileType::Excel);
        assert_eq!("xlsx".parse::<FileType>().unwrap(), FileType::Excel);
    }

    #[test]
    fn test_numeric_column_access() {
        let obs = Observation {
            fact: Some(1.5),
            wind_speed: Some(3.0),
            ..Default::default()
        };
        assert_eq!(NumericColumn::Fact.value(&obs), Some(1.5));
        assert_eq!(NumericColumn::WindSpeed.value(&obs), Some(3.0));
        assert_eq!(NumericColumn::Plan.value(&obs), None);
        assert_eq!(NumericColumn::WindSpeed.to_string(), "wind_speed");
    }
}
