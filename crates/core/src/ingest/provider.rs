use crate::config::Settings;
use crate::domain::features::FeatureRow;
use crate::domain::instrument::Instrument;
use crate::ingest::types::{FeatureRowResponse, FeatureTableRow};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/features";

/// The provider has no row for the requested date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRowNotFound {
    pub instrument: Instrument,
    pub date: NaiveDate,
}

impl fmt::Display for FeatureRowNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no feature row for {} on {}", self.instrument, self.date)
    }
}

impl std::error::Error for FeatureRowNotFound {}

#[async_trait::async_trait]
pub trait FeatureProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_features(&self, date: NaiveDate, instrument: Instrument) -> Result<FeatureRow>;
}

/// Picks the HTTP feature service when `FEATURE_PROVIDER_BASE_URL` is set,
/// otherwise the cached feature table on disk.
pub fn from_settings(settings: &Settings) -> Result<Box<dyn FeatureProvider>> {
    if settings.feature_provider_base_url.is_some() {
        Ok(Box::new(HttpJsonFeatureProvider::from_settings(settings)?))
    } else {
        Ok(Box::new(FileFeatureProvider::new(settings.features_dir.clone())))
    }
}

#[derive(Debug, Clone)]
pub struct HttpJsonFeatureProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
}

impl HttpJsonFeatureProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_feature_provider_base_url()?.to_string();
        let api_key = settings.feature_provider_api_key.clone();

        let timeout_secs = std::env::var("FEATURE_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let path = std::env::var("FEATURE_PROVIDER_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build feature provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl FeatureProvider for HttpJsonFeatureProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_features(&self, date: NaiveDate, instrument: Instrument) -> Result<FeatureRow> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[
                ("date", date.to_string()),
                ("ticker", instrument.symbol().to_string()),
            ])
            .send()
            .await
            .context("feature provider request failed")?;

        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FeatureRowNotFound { instrument, date }.into());
        }
        let text = res
            .text()
            .await
            .context("failed to read feature provider response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("feature provider response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("feature provider HTTP {status}: {raw_json}");
        }

        let parsed = serde_json::from_value::<FeatureRowResponse>(raw_json)
            .context("failed to parse feature provider response into FeatureRowResponse")?;
        into_feature_row(parsed, date, instrument)
    }
}

fn into_feature_row(
    resp: FeatureRowResponse,
    expected_date: NaiveDate,
    expected: Instrument,
) -> Result<FeatureRow> {
    anyhow::ensure!(
        resp.date == expected_date,
        "feature provider date mismatch: expected {expected_date}, got {}",
        resp.date
    );
    let ticker: Instrument = resp.ticker.parse()?;
    anyhow::ensure!(
        ticker == expected,
        "feature provider ticker mismatch: expected {expected}, got {ticker}"
    );
    FeatureRow::try_new(resp.date, ticker, resp.features)
}

/// Reads `{dir}/{SYMBOL}.json`, a JSON array of [`FeatureTableRow`].
#[derive(Debug, Clone)]
pub struct FileFeatureProvider {
    dir: PathBuf,
}

impl FileFeatureProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn table_path(&self, instrument: Instrument) -> PathBuf {
        self.dir.join(format!("{}.json", instrument.symbol()))
    }
}

#[async_trait::async_trait]
impl FeatureProvider for FileFeatureProvider {
    fn provider_name(&self) -> &'static str {
        "feature_table_file"
    }

    async fn fetch_features(&self, date: NaiveDate, instrument: Instrument) -> Result<FeatureRow> {
        let path = self.table_path(instrument);
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read feature table {}", path.display()))?;
        let rows = serde_json::from_str::<Vec<FeatureTableRow>>(&text)
            .with_context(|| format!("invalid feature table {}", path.display()))?;

        let Some(row) = rows.into_iter().find(|r| r.date == date) else {
            return Err(FeatureRowNotFound { instrument, date }.into());
        };

        tracing::debug!(%date, %instrument, path = %path.display(), "feature row loaded from table");
        FeatureRow::try_new(date, instrument, row.features)
    }
}
