use crate::config::Settings;
use crate::domain::instrument::Instrument;
use crate::ingest::types::PriceSeries;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0";

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily closes for the half-open window `[start, end)`.
    async fn daily_closes(
        &self,
        instrument: Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries>;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    // Absent when the window holds no sessions.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Daily bars from the Yahoo Finance v8 chart endpoint.
#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .market_data_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self, instrument: Instrument) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            instrument.symbol()
        )
    }
}

#[async_trait::async_trait]
impl MarketDataClient for YahooChartClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn daily_closes(
        &self,
        instrument: Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let period1 = midnight_utc_timestamp(start)?;
        let period2 = midnight_utc_timestamp(end)?;

        let res = self
            .http
            .get(self.url(instrument))
            .query(&[
                ("interval", "1d".to_string()),
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
            ])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        // Yahoo answers 404 with a JSON error body for unknown symbols and
        // empty windows alike; let the envelope decide.
        let parsed = serde_json::from_str::<ChartResponse>(&text).with_context(|| {
            format!("market data HTTP {status}: response is not a chart payload: {text}")
        })?;

        let series = into_price_series(parsed, start, end)?;
        tracing::debug!(
            %instrument,
            %start,
            %end,
            points = series.len(),
            "daily closes fetched"
        );
        Ok(series)
    }
}

fn midnight_utc_timestamp(date: NaiveDate) -> Result<i64> {
    let dt = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("invalid midnight for {date}"))?;
    Ok(dt.and_utc().timestamp())
}

fn into_price_series(resp: ChartResponse, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries> {
    if let Some(error) = resp.chart.error {
        // An empty window is not a transport failure.
        if error.code == "Not Found" && error.description.contains("No data found") {
            return Ok(PriceSeries::default());
        }
        anyhow::bail!("market data error: {} - {}", error.code, error.description);
    }

    let Some(data) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceSeries::default());
    };

    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut points = Vec::with_capacity(data.timestamp.len());
    for (i, ts) in data.timestamp.iter().enumerate() {
        let date = DateTime::from_timestamp(*ts, 0)
            .with_context(|| format!("invalid bar timestamp {ts}"))?
            .date_naive();
        if date < start || date >= end {
            continue;
        }
        let close = closes.get(i).copied().flatten().filter(|c| c.is_finite());
        points.push((date, close));
    }

    Ok(PriceSeries::new(points))
}
