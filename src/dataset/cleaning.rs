//! Hourly alignment of cleaned observations

use chrono::{Duration, NaiveDateTime, Timelike};
use std::collections::BTreeMap;

use super::DatasetError;
use crate::domain::Observation;

/// Target and regressors on a contiguous hourly grid.
///
/// Slot `i` covers `start + i` hours. Hours with no surviving observation are
/// `None` in every series.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyFrame {
    pub start: NaiveDateTime,
    pub fact: Vec<Option<f64>>,
    pub cloudiness: Vec<Option<f64>>,
    pub temperature: Vec<Option<f64>>,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    fact: f64,
    cloudiness: f64,
    temperature: f64,
}

fn floor_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

impl HourlyFrame {
    /// Build the frame from raw observations.
    ///
    /// Rows missing the date, `fact`, `cloudiness` or `temperature` are dropped.
    /// Timestamps are floored to the hour and rows sharing an hour are averaged.
    /// Returns `Ok(None)` when no row survives, and fails before allocating
    /// when the grid would exceed `max_hours` slots.
    pub fn from_observations(
        observations: &[Observation],
        max_hours: usize,
    ) -> Result<Option<Self>, DatasetError> {
        let mut buckets: BTreeMap<NaiveDateTime, Accumulator> = BTreeMap::new();
        for obs in observations {
            let (Some(date), Some(fact), Some(cloudiness), Some(temperature)) =
                (obs.date, obs.fact, obs.cloudiness, obs.temperature)
            else {
                continue;
            };
            let acc = buckets.entry(floor_to_hour(date)).or_default();
            acc.count += 1;
            acc.fact += fact;
            acc.cloudiness += cloudiness;
            acc.temperature += temperature;
        }

        let (Some(&start), Some(&end)) = (buckets.keys().next(), buckets.keys().next_back()) else {
            return Ok(None);
        };
        let hours = (end - start).num_hours() + 1;
        if hours > max_hours as i64 {
            return Err(DatasetError::SpanTooLong { start, end, hours, max: max_hours });
        }
        let len = hours as usize;

        let mut frame = HourlyFrame {
            start,
            fact: vec![None; len],
            cloudiness: vec![None; len],
            temperature: vec![None; len],
        };
        for (hour, acc) in buckets {
            let idx = (hour - start).num_hours() as usize;
            let n = acc.count as f64;
            frame.fact[idx] = Some(acc.fact / n);
            frame.cloudiness[idx] = Some(acc.cloudiness / n);
            frame.temperature[idx] = Some(acc.temperature / n);
        }
        Ok(Some(frame))
    }

    pub fn len(&self) -> usize {
        self.fact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fact.is_empty()
    }

    pub fn timestamp(&self, idx: usize) -> NaiveDateTime {
        self.start + Duration::hours(idx as i64)
    }

    /// Number of grid hours holding an observation
    pub fn observed_count(&self) -> usize {
        self.fact.iter().filter(|v| v.is_some()).count()
    }
}

/// Fill gaps by linear interpolation between neighbours.
///
/// Leading and trailing gaps take the nearest observed value. Returns `None`
/// when the series holds no observation at all.
pub fn interpolate_gaps(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    let (&(first_idx, first_val), &(last_idx, last_val)) = (known.first()?, known.last()?);

    let mut filled = Vec::with_capacity(values.len());
    let mut next = 0usize;
    for i in 0..values.len() {
        if i <= first_idx {
            filled.push(first_val);
            continue;
        }
        if i >= last_idx {
            filled.push(last_val);
            continue;
        }
        while known[next + 1].0 < i {
            next += 1;
        }
        let (lo_idx, lo_val) = known[next];
        let (hi_idx, hi_val) = known[next + 1];
        if i == hi_idx {
            filled.push(hi_val);
        } else {
            let w = (i - lo_idx) as f64 / (hi_idx - lo_idx) as f64;
            filled.push(lo_val + w * (hi_val - lo_val));
        }
    }
    Some(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    const MAX_HOURS: usize = 24 * 366;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn obs(date: NaiveDateTime, fact: Option<f64>) -> Observation {
        Observation {
            date: Some(date),
            fact,
            cloudiness: Some(10.0),
            temperature: Some(20.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_inserts_gaps_and_drops_incomplete_rows() {
        let rows = vec![
            obs(at(0, 0), Some(1.0)),
            obs(at(1, 0), None),
            obs(at(3, 0), Some(3.0)),
        ];
        let frame = HourlyFrame::from_observations(&rows, MAX_HOURS).unwrap().unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.fact, vec![Some(1.0), None, None, Some(3.0)]);
        assert_eq!(frame.observed_count(), 2);
        assert_eq!(frame.timestamp(3), at(3, 0));
    }

    #[test]
    fn test_frame_sorts_and_averages_duplicate_hours() {
        let rows = vec![
            obs(at(2, 0), Some(5.0)),
            obs(at(0, 15), Some(1.0)),
            obs(at(0, 45), Some(3.0)),
        ];
        let frame = HourlyFrame::from_observations(&rows, MAX_HOURS).unwrap().unwrap();
        assert_eq!(frame.start, at(0, 0));
        assert_eq!(frame.fact, vec![Some(2.0), None, Some(5.0)]);
    }

    #[test]
    fn test_frame_from_nothing() {
        let rows = [obs(at(0, 0), None)];
        assert!(HourlyFrame::from_observations(&rows, MAX_HOURS).unwrap().is_none());
    }

    #[test]
    fn test_frame_rejects_span_over_limit() {
        let ancient = NaiveDate::from_ymd_opt(1, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut rows: Vec<Observation> = (0..48)
            .map(|i| obs(at(0, 0) + Duration::hours(i), Some(i as f64)))
            .collect();
        rows.push(obs(ancient, Some(0.0)));

        match HourlyFrame::from_observations(&rows, MAX_HOURS) {
            Err(DatasetError::SpanTooLong { start, end, hours, max }) => {
                assert_eq!(start, ancient);
                assert_eq!(end, at(23, 0) + Duration::hours(24));
                assert!(hours > MAX_HOURS as i64);
                assert_eq!(max, MAX_HOURS);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_frame_span_at_limit() {
        let rows = vec![obs(at(0, 0), Some(1.0)), obs(at(3, 0), Some(2.0))];
        let frame = HourlyFrame::from_observations(&rows, 4).unwrap().unwrap();
        assert_eq!(frame.len(), 4);
        assert!(HourlyFrame::from_observations(&rows, 3).is_err());
    }

    #[test]
    fn test_interpolate_gaps() {
        let filled = interpolate_gaps(&[None, Some(1.0), None, None, Some(4.0), None]).unwrap();
        let expected = [1.0, 1.0, 2.0, 3.0, 4.0, 4.0];
        for (a, b) in filled.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b);
        }
        assert!(interpolate_gaps(&[None, None]).is_none());
    }
}
