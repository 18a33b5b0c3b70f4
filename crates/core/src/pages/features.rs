use crate::domain::features::{FeatureRow, LAG_RETURN, MODEL_FEATURES};
use crate::domain::instrument::Instrument;
use crate::pages::Services;
use crate::time::us_market::ensure_feature_date_in_range;
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

pub const ERROR_PREFIX: &str = "Error generating features";

/// Feature row laid out for display, columns in model-input order.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureTable {
    pub date: NaiveDate,
    pub instrument: Instrument,
    pub columns: Vec<FeatureColumn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureColumn {
    pub name: String,
    pub value: f64,
}

impl From<FeatureRow> for FeatureTable {
    fn from(row: FeatureRow) -> Self {
        let columns = MODEL_FEATURES
            .iter()
            .filter(|name| **name != LAG_RETURN)
            .filter_map(|name| {
                row.values.get(*name).map(|v| FeatureColumn {
                    name: name.to_string(),
                    value: *v,
                })
            })
            .collect();

        Self {
            date: row.date,
            instrument: row.instrument,
            columns,
        }
    }
}

/// Fetches the feature row behind the lookup page. Dates outside the
/// supported range are rejected before the provider is called; provider
/// failures are returned once, without retry.
pub async fn lookup_features(
    services: &Services,
    date: NaiveDate,
    instrument: Instrument,
) -> anyhow::Result<FeatureTable> {
    ensure_feature_date_in_range(date)?;

    let t0 = std::time::Instant::now();
    let row = services
        .features
        .fetch_features(date, instrument)
        .await
        .with_context(|| format!("feature lookup for {instrument} on {date} failed"))?;

    tracing::info!(
        %date,
        %instrument,
        elapsed_ms = t0.elapsed().as_millis(),
        "features generated"
    );
    Ok(row.into())
}
