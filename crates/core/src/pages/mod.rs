pub mod error;
pub mod features;
pub mod format;
pub mod predict;
pub mod visualization;

use crate::chart::{ChartRenderer, FileValidationSource};
use crate::config::Settings;
use crate::ingest::market::{MarketDataClient, YahooChartClient};
use crate::ingest::provider::{self, FeatureProvider};
use crate::model::ModelRegistry;

/// Collaborators shared by every page. Built once at startup; read-only.
pub struct Services {
    pub features: Box<dyn FeatureProvider>,
    pub market: Box<dyn MarketDataClient>,
    pub models: ModelRegistry,
    pub charts: ChartRenderer,
    pub max_lookback_days: u32,
}

impl Services {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let features = provider::from_settings(settings)?;
        let market = Box::new(YahooChartClient::from_settings(settings)?);
        let models = ModelRegistry::load_dir(&settings.models_dir)?;
        let charts = ChartRenderer::new(Box::new(FileValidationSource::new(
            settings.validation_dir.clone(),
        )));

        tracing::info!(
            features = features.provider_name(),
            market = market.provider_name(),
            max_lookback_days = settings.max_lookback_days,
            "services ready"
        );

        Ok(Self {
            features,
            market,
            models,
            charts,
            max_lookback_days: settings.max_lookback_days,
        })
    }
}
