pub mod chart;
pub mod domain;
pub mod ingest;
pub mod model;
pub mod pages;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    use crate::ingest::lag_return::DEFAULT_MAX_LOOKBACK_DAYS;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub models_dir: PathBuf,
        pub features_dir: PathBuf,
        pub validation_dir: PathBuf,
        pub feature_provider_base_url: Option<String>,
        pub feature_provider_api_key: Option<String>,
        pub market_data_base_url: Option<String>,
        pub max_lookback_days: u32,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                models_dir: PathBuf::from("models"),
                features_dir: PathBuf::from("data/features"),
                validation_dir: PathBuf::from("data/validation"),
                feature_provider_base_url: None,
                feature_provider_api_key: None,
                market_data_base_url: None,
                max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();

            let max_lookback_days = match non_empty_var("LAG_RETURN_LOOKBACK_DAYS") {
                Some(s) => s
                    .parse::<u32>()
                    .with_context(|| format!("LAG_RETURN_LOOKBACK_DAYS must be an integer (got {s:?})"))?,
                None => defaults.max_lookback_days,
            };
            anyhow::ensure!(
                max_lookback_days >= 1,
                "LAG_RETURN_LOOKBACK_DAYS must be >= 1"
            );

            Ok(Self {
                models_dir: non_empty_var("MODELS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.models_dir),
                features_dir: non_empty_var("FEATURES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.features_dir),
                validation_dir: non_empty_var("VALIDATION_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.validation_dir),
                feature_provider_base_url: non_empty_var("FEATURE_PROVIDER_BASE_URL"),
                feature_provider_api_key: non_empty_var("FEATURE_PROVIDER_API_KEY"),
                market_data_base_url: non_empty_var("MARKET_DATA_BASE_URL"),
                max_lookback_days,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_feature_provider_base_url(&self) -> anyhow::Result<&str> {
            self.feature_provider_base_url
                .as_deref()
                .context("FEATURE_PROVIDER_BASE_URL is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }
}
