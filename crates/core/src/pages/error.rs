use crate::domain::instrument::Instrument;
use crate::ingest::lag_return::LagReturnNotFound;
use crate::ingest::provider::FeatureRowNotFound;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Features,
    LagReturn,
    Model,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Features => "features",
            Stage::LagReturn => "lag_return",
            Stage::Model => "model",
        }
    }

    /// Prefix shown in front of the collaborator's message.
    pub fn user_prefix(&self) -> &'static str {
        match self {
            Stage::Features => "Failed to fetch features",
            Stage::LagReturn => "Lag return error",
            Stage::Model => "Model inference error",
        }
    }
}

/// A prediction request aborted at `stage` while handling `instrument`.
#[derive(Debug)]
pub struct PipelineError {
    pub stage: Stage,
    pub instrument: Instrument,
    pub source: anyhow::Error,
}

impl PipelineError {
    pub fn new(stage: Stage, instrument: Instrument, source: anyhow::Error) -> Self {
        Self {
            stage,
            instrument,
            source,
        }
    }

    pub fn is_lag_return_not_found(&self) -> bool {
        self.source.downcast_ref::<LagReturnNotFound>().is_some()
    }

    pub fn is_feature_row_not_found(&self) -> bool {
        self.source.downcast_ref::<FeatureRowNotFound>().is_some()
    }

    /// The request named data that does not exist, as opposed to a
    /// collaborator that misbehaved.
    pub fn is_not_found(&self) -> bool {
        match self.stage {
            Stage::Features => self.is_feature_row_not_found(),
            Stage::LagReturn => self.is_lag_return_not_found(),
            Stage::Model => false,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.stage.user_prefix(), self.source)
    }
}

// The cause is already part of Display; keep it out of the chain so `{:#}`
// does not print it twice.
impl std::error::Error for PipelineError {}
