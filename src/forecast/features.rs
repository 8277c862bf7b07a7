//! Lag-feature construction for the tree ensemble

use chrono::NaiveDateTime;

use crate::dataset::HourlyFrame;

/// Number of lagged target values per row
pub const LAG_COUNT: usize = 24;

/// Supervised design matrix derived from an hourly frame.
///
/// Row `r` predicts the target at `timestamps[r]` from
/// `lag_1..lag_24, cloudiness, temperature`.
#[derive(Debug, Clone, Default)]
pub struct LagFeatures {
    pub timestamps: Vec<NaiveDateTime>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl LagFeatures {
    /// Build one row per grid hour with a complete feature set.
    ///
    /// Hours whose target, regressors or any of the lags is a gap are skipped.
    pub fn build(frame: &HourlyFrame, lags: usize) -> Self {
        let mut out = LagFeatures::default();
        for i in lags..frame.len() {
            let Some(target) = frame.fact[i] else {
                continue;
            };
            let lagged: Option<Vec<f64>> = (1..=lags).map(|k| frame.fact[i - k]).collect();
            let (Some(mut row), Some(cloudiness), Some(temperature)) =
                (lagged, frame.cloudiness[i], frame.temperature[i])
            else {
                continue;
            };
            row.push(cloudiness);
            row.push(temperature);

            out.timestamps.push(frame.timestamp(i));
            out.rows.push(row);
            out.targets.push(target);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Split off the trailing `count` rows, returning `(head, tail)`
    pub fn split_tail(mut self, count: usize) -> (LagFeatures, LagFeatures) {
        let at = self.len().saturating_sub(count);
        let tail = LagFeatures {
            timestamps: self.timestamps.split_off(at),
            rows: self.rows.split_off(at),
            targets: self.targets.split_off(at),
        };
        (self, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame(fact: Vec<Option<f64>>) -> HourlyFrame {
        let n = fact.len();
        HourlyFrame {
            start: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            fact,
            cloudiness: vec![Some(50.0); n],
            temperature: vec![Some(18.0); n],
        }
    }

    #[test]
    fn test_rows_hold_lags_in_order() {
        let f = frame((0..6).map(|v| Some(v as f64)).collect());
        let feats = LagFeatures::build(&f, 2);
        assert_eq!(feats.len(), 4);
        assert_eq!(feats.rows[0], vec![1.0, 0.0, 50.0, 18.0]);
        assert_eq!(feats.targets[0], 2.0);
        assert_eq!(feats.timestamps[0], f.timestamp(2));
    }

    #[test]
    fn test_gap_drops_every_row_that_sees_it() {
        let mut values: Vec<Option<f64>> = (0..8).map(|v| Some(v as f64)).collect();
        values[4] = None;
        let feats = LagFeatures::build(&frame(values), 2);
        // targets 2, 3, 7 survive; 4 is a gap, 5 and 6 lag over it
        assert_eq!(feats.targets, vec![2.0, 3.0, 7.0]);
    }

    #[test]
    fn test_split_tail() {
        let f = frame((0..10).map(|v| Some(v as f64)).collect());
        let (head, tail) = LagFeatures::build(&f, 1).split_tail(3);
        assert_eq!(head.len(), 6);
        assert_eq!(tail.targets, vec![7.0, 8.0, 9.0]);
    }
}
