use crate::domain::features::FeatureRow;
use crate::domain::instrument::Instrument;
use crate::domain::prediction::{PredictionSet, VolumePrediction};
use crate::ingest::lag_return::resolve_lag_return;
use crate::pages::error::{PipelineError, Stage};
use crate::pages::Services;
use chrono::NaiveDate;

/// Runs the prediction page for every instrument.
///
/// Feature rows are fetched for all instruments first, then lag returns,
/// then the models run. The first failure aborts the whole request; no
/// partial results are returned.
pub async fn predict_volumes(
    services: &Services,
    date: NaiveDate,
) -> Result<PredictionSet, PipelineError> {
    let t0 = std::time::Instant::now();

    let mut rows: Vec<FeatureRow> = Vec::with_capacity(Instrument::ALL.len());
    for instrument in Instrument::ALL {
        let row = services
            .features
            .fetch_features(date, instrument)
            .await
            .map_err(|e| PipelineError::new(Stage::Features, instrument, e))?;
        rows.push(row);
    }

    let mut lag_returns: Vec<f64> = Vec::with_capacity(rows.len());
    for row in &rows {
        let lag = resolve_lag_return(
            &*services.market,
            row.instrument,
            date,
            services.max_lookback_days,
        )
        .await
        .map_err(|e| PipelineError::new(Stage::LagReturn, row.instrument, e))?;
        lag_returns.push(lag);
    }

    let mut predictions: Vec<VolumePrediction> = Vec::with_capacity(rows.len());
    for (row, lag) in rows.into_iter().zip(lag_returns) {
        let instrument = row.instrument;
        let input = row.with_lag_return(lag);
        let prediction = services
            .models
            .predict(&input)
            .map_err(|e| PipelineError::new(Stage::Model, instrument, e))?;

        tracing::info!(
            %date,
            %instrument,
            lag_return = lag,
            pred_log = prediction.pred_log,
            pred_vol = prediction.pred_vol,
            "volume predicted"
        );
        predictions.push(prediction);
    }

    tracing::debug!(%date, elapsed_ms = t0.elapsed().as_millis(), "prediction request done");
    Ok(PredictionSet { date, predictions })
}
