pub mod svg;

use crate::domain::instrument::Instrument;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Held-out day with the realized and the model-predicted volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPoint {
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

#[async_trait::async_trait]
pub trait ValidationSeriesSource: Send + Sync {
    async fn load(&self, instrument: Instrument) -> Result<Vec<ValidationPoint>>;
}

/// Reads `{dir}/{SYMBOL}.json`, a JSON array of [`ValidationPoint`].
#[derive(Debug, Clone)]
pub struct FileValidationSource {
    dir: PathBuf,
}

impl FileValidationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl ValidationSeriesSource for FileValidationSource {
    async fn load(&self, instrument: Instrument) -> Result<Vec<ValidationPoint>> {
        let path = self.dir.join(format!("{}.json", instrument.symbol()));
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read validation series {}", path.display()))?;
        let mut points = serde_json::from_str::<Vec<ValidationPoint>>(&text)
            .with_context(|| format!("invalid validation series {}", path.display()))?;
        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

/// Renders the predicted-vs-actual chart for one instrument.
pub struct ChartRenderer {
    source: Box<dyn ValidationSeriesSource>,
    options: svg::ChartOptions,
}

impl ChartRenderer {
    pub fn new(source: Box<dyn ValidationSeriesSource>) -> Self {
        Self {
            source,
            options: svg::ChartOptions::default(),
        }
    }

    pub async fn render(&self, instrument: Instrument) -> Result<String> {
        let points = self.source.load(instrument).await?;
        anyhow::ensure!(!points.is_empty(), "validation series for {instrument} is empty");

        let title = format!("{instrument} Prediction vs Actual");
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        let actual: Vec<f64> = points.iter().map(|p| p.actual).collect();
        let predicted: Vec<f64> = points.iter().map(|p| p.predicted).collect();

        Ok(svg::line_chart(
            &self.options,
            &title,
            &dates,
            &[
                svg::Series {
                    label: "Actual",
                    color: "#1f77b4",
                    values: &actual,
                },
                svg::Series {
                    label: "Predicted",
                    color: "#ff7f0e",
                    values: &predicted,
                },
            ],
        ))
    }
}
