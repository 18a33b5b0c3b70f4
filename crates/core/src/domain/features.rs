use crate::domain::instrument::Instrument;
use anyhow::ensure;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LAG_RETURN: &str = "lag_return";

/// Model input columns, in the order the regression artifacts were fitted on.
pub const MODEL_FEATURES: [&str; 12] = [
    "lag_vol",
    LAG_RETURN,
    "rolling_std_5d",
    "lag_vix",
    "NFP_surprise_z",
    "ISM_surprise_z",
    "CPI_surprise_z",
    "Housing_Starts_surprise_z",
    "Jobless_Claims_surprise_z",
    "monday_dummy",
    "wednesday_dummy",
    "friday_dummy",
];

/// Engineered features for one instrument on one date, as supplied by a
/// [`FeatureProvider`](crate::ingest::provider::FeatureProvider).
///
/// Always holds exactly [`MODEL_FEATURES`] minus [`LAG_RETURN`]; the lag
/// return is resolved from market data at request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub instrument: Instrument,
    pub values: BTreeMap<String, f64>,
}

impl FeatureRow {
    pub fn try_new(
        date: NaiveDate,
        instrument: Instrument,
        values: BTreeMap<String, f64>,
    ) -> anyhow::Result<Self> {
        ensure!(
            !values.contains_key(LAG_RETURN),
            "feature row for {instrument} on {date} must not carry {LAG_RETURN}"
        );

        for name in values.keys() {
            ensure!(
                MODEL_FEATURES.contains(&name.as_str()),
                "unexpected feature {name:?} for {instrument} on {date}"
            );
        }

        let missing: Vec<&str> = MODEL_FEATURES
            .iter()
            .copied()
            .filter(|name| *name != LAG_RETURN && !values.contains_key(*name))
            .collect();
        ensure!(
            missing.is_empty(),
            "feature row for {instrument} on {date} is missing: {}",
            missing.join(", ")
        );

        Ok(Self {
            date,
            instrument,
            values,
        })
    }

    /// Consumes the row and injects the resolved lag return, producing the
    /// ordered vector the model expects.
    pub fn with_lag_return(self, lag_return: f64) -> ModelInput {
        let mut values = [0.0; MODEL_FEATURES.len()];
        for (slot, name) in values.iter_mut().zip(MODEL_FEATURES) {
            *slot = if name == LAG_RETURN {
                lag_return
            } else {
                // Presence is checked in try_new.
                self.values.get(name).copied().unwrap_or(f64::NAN)
            };
        }

        ModelInput {
            date: self.date,
            instrument: self.instrument,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub date: NaiveDate,
    pub instrument: Instrument,
    pub values: [f64; MODEL_FEATURES.len()],
}

impl ModelInput {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        MODEL_FEATURES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.values[idx])
    }
}
