pub mod artifact;

use crate::domain::features::ModelInput;
use crate::domain::instrument::Instrument;
use crate::domain::prediction::VolumePrediction;
use anyhow::Context;
use artifact::ModelArtifact;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A fitted regressor producing `log1p(volume)` from an ordered feature vector.
pub trait RegressionModel: Send + Sync {
    fn kind(&self) -> &'static str;

    fn predict(&self, features: &[f64]) -> anyhow::Result<f64>;
}

impl RegressionModel for ModelArtifact {
    fn kind(&self) -> &'static str {
        ModelArtifact::kind(self)
    }

    fn predict(&self, features: &[f64]) -> anyhow::Result<f64> {
        ModelArtifact::predict(self, features)
    }
}

pub fn artifact_path(models_dir: &Path, instrument: Instrument) -> PathBuf {
    models_dir.join(format!("best_model_{}.json", instrument.slug()))
}

/// One model per instrument, loaded at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<Instrument, Arc<dyn RegressionModel>>,
}

impl ModelRegistry {
    pub fn load_dir(models_dir: &Path) -> anyhow::Result<Self> {
        let mut registry = Self::default();
        for instrument in Instrument::ALL {
            let path = artifact_path(models_dir, instrument);
            let artifact = ModelArtifact::load(&path)
                .with_context(|| format!("failed to load model for {instrument}"))?;
            tracing::info!(%instrument, kind = artifact.kind(), path = %path.display(), "model loaded");
            registry.insert(instrument, Arc::new(artifact));
        }
        Ok(registry)
    }

    pub fn insert(&mut self, instrument: Instrument, model: Arc<dyn RegressionModel>) {
        self.models.insert(instrument, model);
    }

    pub fn get(&self, instrument: Instrument) -> anyhow::Result<&Arc<dyn RegressionModel>> {
        self.models
            .get(&instrument)
            .with_context(|| format!("no model loaded for {instrument}"))
    }

    pub fn predict(&self, input: &ModelInput) -> anyhow::Result<VolumePrediction> {
        let model = self.get(input.instrument)?;
        let pred_log = model.predict(input.as_slice())?;
        Ok(VolumePrediction::from_log(input.instrument, pred_log))
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: BTreeMap<_, _> = self.models.iter().map(|(i, m)| (*i, m.kind())).collect();
        f.debug_struct("ModelRegistry").field("models", &kinds).finish()
    }
}
