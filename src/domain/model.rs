use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use validator::Validate;

/// Forecasting procedures a prediction request can select
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailableModel {
    Sarima,
    FbProphet,
    Xgboost,
}

impl AvailableModel {
    pub fn all() -> Vec<AvailableModel> {
        AvailableModel::iter().collect()
    }
}

fn default_horizon() -> u32 {
    48
}

/// Body of `POST /data/{data_id}/predictions/run`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictionConfig {
    pub model_type: AvailableModel,
    /// Forecast horizon in hours
    #[serde(default = "default_horizon")]
    #[validate(range(min = 24, max = 128))]
    pub forecast_horizon: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names() {
        let names: Vec<String> = AvailableModel::all().iter().map(|m| m.to_string()).collect();
        assert_eq!(names, vec!["SARIMA", "FB_PROPHET", "XGBOOST"]);
        assert_eq!(
            serde_json::to_string(&AvailableModel::FbProphet).unwrap(),
            "\"FB_PROPHET\""
        );
    }

    #[test]
    fn test_prediction_config_defaults_horizon() {
        let cfg: PredictionConfig = serde_json::from_str(r#"{"model_type":"XGBOOST"}"#).unwrap();
        assert_eq!(cfg.forecast_horizon, 48);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_prediction_config_horizon_bounds() {
        for (horizon, ok) in [(23, false), (24, true), (128, true), (129, false)] {
            let cfg = PredictionConfig {
                model_type: AvailableModel::Sarima,
                forecast_horizon: horizon,
            };
            assert_eq!(cfg.validate().is_ok(), ok, "horizon {horizon}");
        }
    }

    #[test]
    fn test_unknown_model_rejected() {
        let parsed = serde_json::from_str::<PredictionConfig>(r#"{"model_type":"LSTM"}"#);
        assert!(parsed.is_err());
    }
}
