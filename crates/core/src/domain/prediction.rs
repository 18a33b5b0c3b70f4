use crate::domain::instrument::Instrument;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumePrediction {
    pub instrument: Instrument,
    /// Model output on the log1p scale.
    pub pred_log: f64,
    pub pred_vol: f64,
}

impl VolumePrediction {
    pub fn from_log(instrument: Instrument, pred_log: f64) -> Self {
        Self {
            instrument,
            pred_log,
            pred_vol: pred_log.exp_m1(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionSet {
    pub date: NaiveDate,
    pub predictions: Vec<VolumePrediction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_transform_round_trips_through_log1p() {
        for pred_log in [-3.0, 0.0, 1.5, 16.2, 18.9] {
            let p = VolumePrediction::from_log(Instrument::Spy, pred_log);
            assert!((p.pred_vol.ln_1p() - pred_log).abs() < 1e-9);
            assert!(p.pred_vol >= -1.0);
        }
    }

    #[test]
    fn volume_is_exp_minus_one() {
        let p = VolumePrediction::from_log(Instrument::Sso, 2.0);
        assert!((p.pred_vol - (2.0_f64.exp() - 1.0)).abs() < 1e-12);
    }
}
