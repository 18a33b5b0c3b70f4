use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response body of the HTTP feature service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRowResponse {
    pub date: NaiveDate,
    pub ticker: String,
    pub features: BTreeMap<String, f64>,
}

/// One row of a cached feature table (`{FEATURES_DIR}/{SYMBOL}.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTableRow {
    pub date: NaiveDate,
    pub features: BTreeMap<String, f64>,
}

/// Daily closes ordered by date. `None` marks a session the provider
/// returned without a close.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl PriceSeries {
    pub fn new(mut points: Vec<(NaiveDate, Option<f64>)>) -> Self {
        points.sort_by_key(|(d, _)| *d);
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Close-to-close log returns over consecutive rows. A missing or
    /// non-positive close on either side yields `None` for that step.
    pub fn log_returns(&self) -> Vec<(NaiveDate, Option<f64>)> {
        self.points
            .windows(2)
            .map(|w| {
                let (_, prev) = w[0];
                let (date, cur) = w[1];
                let ret = match (prev, cur) {
                    (Some(p), Some(c)) if p > 0.0 && c > 0.0 => Some(c.ln() - p.ln()),
                    _ => None,
                };
                (date, ret.filter(|r| r.is_finite()))
            })
            .collect()
    }

    /// Most recent non-missing log return, if any.
    pub fn last_log_return(&self) -> Option<f64> {
        self.log_returns().into_iter().rev().find_map(|(_, r)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
    }

    #[test]
    fn last_return_skips_trailing_gaps() {
        let series = PriceSeries::new(vec![
            (d(22), Some(100.0)),
            (d(23), Some(110.0)),
            (d(24), None),
        ]);
        let r = series.last_log_return().unwrap();
        assert!((r - (110.0_f64 / 100.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn gap_breaks_the_step_on_both_sides() {
        let series = PriceSeries::new(vec![(d(22), Some(100.0)), (d(23), None), (d(24), Some(90.0))]);
        assert_eq!(series.last_log_return(), None);
    }

    #[test]
    fn single_close_has_no_return() {
        let series = PriceSeries::new(vec![(d(25), Some(500.0))]);
        assert_eq!(series.last_log_return(), None);
        assert!(PriceSeries::default().last_log_return().is_none());
    }

    #[test]
    fn sorts_points_by_date() {
        let series = PriceSeries::new(vec![(d(24), Some(2.0)), (d(23), Some(1.0))]);
        assert_eq!(series.points[0].0, d(23));
        assert!((series.last_log_return().unwrap() - 2.0_f64.ln()).abs() < 1e-12);
    }
}
