use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volcast_core::domain::instrument::Instrument;
use volcast_core::domain::prediction::PredictionSet;
use volcast_core::ingest::provider::FeatureRowNotFound;
use volcast_core::pages::features::FeatureTable;
use volcast_core::pages::{features, predict, visualization, Services};
use volcast_core::time::us_market::{
    ensure_feature_date_in_range, lookback_window, parse_date, resolve_target_date,
    DEFAULT_TARGET_DATE,
};

mod html;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = volcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let services = match Services::from_settings(&settings) {
        Ok(services) => Some(Arc::new(services)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            let message = format!("{e:#}");
            tracing::error!(error = %message, "service setup failed; starting dashboard in degraded mode");
            None
        }
    };

    let state = AppState { services };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(index))
        .route("/visualization", get(visualization_page))
        .route("/features", get(features_page))
        .route("/predict", get(predict_page))
        .route("/api/features/:date/:instrument", get(get_features))
        .route("/api/predictions/:date", get(get_predictions))
        .route("/api/charts/:instrument", get(get_chart))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "dashboard listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    services: Option<Arc<Services>>,
}

impl AppState {
    fn services(&self) -> Result<&Services, String> {
        self.services
            .as_deref()
            .ok_or_else(|| "dashboard is running in degraded mode; check the server logs".to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    date: Option<String>,
    instrument: Option<String>,
}

async fn index() -> Html<String> {
    Html(html::index_page())
}

async fn visualization_page(State(state): State<AppState>) -> Html<String> {
    let services = match state.services() {
        Ok(s) => s,
        Err(message) => {
            return Html(html::layout(
                "Model Visualization",
                &html::error_banner("Error rendering charts", &message),
            ))
        }
    };

    let tabs = visualization::render_charts(services).await;
    Html(html::visualization_page(&tabs))
}

/// Without `date` only the form is shown; submitting it runs the lookup.
async fn features_page(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Html<String> {
    let instrument = match q.instrument.as_deref().filter(|s| !s.trim().is_empty()) {
        None => Instrument::Spy,
        Some(s) => match s.parse::<Instrument>() {
            Ok(instrument) => instrument,
            Err(e) => {
                return Html(html::features_page(
                    DEFAULT_TARGET_DATE,
                    Instrument::Spy,
                    Some(Err(format!("{e:#}"))),
                ))
            }
        },
    };

    let Some(date_arg) = q.date.as_deref() else {
        return Html(html::features_page(DEFAULT_TARGET_DATE, instrument, None));
    };

    let (date, outcome) = match parse_date(date_arg) {
        Ok(date) => (date, run_feature_lookup(&state, date, instrument).await),
        Err(e) => (DEFAULT_TARGET_DATE, Err(format!("{e:#}"))),
    };

    Html(html::features_page(date, instrument, Some(outcome)))
}

async fn run_feature_lookup(
    state: &AppState,
    date: chrono::NaiveDate,
    instrument: Instrument,
) -> Result<FeatureTable, String> {
    let services = state.services()?;
    features::lookup_features(services, date, instrument)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            let message = format!("{e:#}");
            tracing::error!(%date, %instrument, error = %message, "feature lookup failed");
            message
        })
}

async fn predict_page(State(state): State<AppState>, Query(q): Query<PageQuery>) -> Html<String> {
    if q.date.is_none() {
        return Html(html::predict_page(DEFAULT_TARGET_DATE, None));
    }

    let (date, outcome) = match resolve_target_date(q.date.as_deref()) {
        Ok(date) => (date, run_prediction(&state, date).await),
        Err(e) => (DEFAULT_TARGET_DATE, Err(format!("{e:#}"))),
    };

    Html(html::predict_page(date, Some(outcome)))
}

async fn run_prediction(state: &AppState, date: chrono::NaiveDate) -> Result<PredictionSet, String> {
    let services = state.services()?;
    predict::predict_volumes(services, date).await.map_err(|e| {
        let message = e.to_string();
        sentry_anyhow::capture_anyhow(&anyhow::Error::new(e));
        tracing::error!(%date, error = %message, "prediction failed");
        message
    })
}

type ApiError = (StatusCode, String);

fn bad_request(e: anyhow::Error) -> ApiError {
    (StatusCode::BAD_REQUEST, format!("{e:#}"))
}

fn degraded(message: String) -> ApiError {
    (StatusCode::SERVICE_UNAVAILABLE, message)
}

async fn get_features(
    State(state): State<AppState>,
    Path((date, instrument)): Path<(String, String)>,
) -> Result<Json<FeatureTable>, ApiError> {
    let services = state.services().map_err(degraded)?;
    let date = parse_date(&date).map_err(bad_request)?;
    let instrument = instrument.parse::<Instrument>().map_err(bad_request)?;

    ensure_feature_date_in_range(date).map_err(bad_request)?;

    let table = features::lookup_features(services, date, instrument)
        .await
        .map_err(|e| {
            let status = if e.downcast_ref::<FeatureRowNotFound>().is_some() {
                StatusCode::NOT_FOUND
            } else {
                sentry_anyhow::capture_anyhow(&e);
                StatusCode::BAD_GATEWAY
            };
            (status, format!("{e:#}"))
        })?;
    Ok(Json(table))
}

async fn get_predictions(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<PredictionSet>, ApiError> {
    let services = state.services().map_err(degraded)?;
    let date = parse_date(&date).map_err(bad_request)?;
    lookback_window(date, services.max_lookback_days).map_err(bad_request)?;

    let set = predict::predict_volumes(services, date).await.map_err(|e| {
        let message = e.to_string();
        let status = if e.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(e));
            StatusCode::BAD_GATEWAY
        };
        (status, message)
    })?;
    Ok(Json(set))
}

async fn get_chart(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
) -> Result<Response, ApiError> {
    let services = state.services().map_err(degraded)?;
    let instrument = instrument
        .trim_end_matches(".svg")
        .parse::<Instrument>()
        .map_err(bad_request)?;

    let svg = services
        .charts
        .render(instrument)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, format!("{e:#}")))?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &volcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use volcast_core::chart::{ChartRenderer, ValidationPoint, ValidationSeriesSource};
    use volcast_core::domain::features::{FeatureRow, LAG_RETURN, MODEL_FEATURES};
    use volcast_core::ingest::market::MarketDataClient;
    use volcast_core::ingest::provider::FeatureProvider;
    use volcast_core::ingest::types::PriceSeries;
    use volcast_core::model::artifact::ModelArtifact;
    use volcast_core::model::ModelRegistry;

    #[derive(Default)]
    struct StubFeatures {
        missing: Vec<Instrument>,
        broken: bool,
    }

    #[async_trait::async_trait]
    impl FeatureProvider for StubFeatures {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_features(
            &self,
            date: NaiveDate,
            instrument: Instrument,
        ) -> anyhow::Result<FeatureRow> {
            anyhow::ensure!(!self.broken, "feature provider HTTP 500");
            if self.missing.contains(&instrument) {
                return Err(FeatureRowNotFound { instrument, date }.into());
            }
            let values: BTreeMap<String, f64> = MODEL_FEATURES
                .iter()
                .filter(|name| **name != LAG_RETURN)
                .map(|name| (name.to_string(), 1.0))
                .collect();
            FeatureRow::try_new(date, instrument, values)
        }
    }

    /// Two closes at the start of every window, or nothing at all.
    struct StubMarket {
        empty: bool,
    }

    #[async_trait::async_trait]
    impl MarketDataClient for StubMarket {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn daily_closes(
            &self,
            _instrument: Instrument,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> anyhow::Result<PriceSeries> {
            if self.empty {
                return Ok(PriceSeries::default());
            }
            let next = start.succ_opt().unwrap_or(start);
            Ok(PriceSeries::new(vec![(start, Some(100.0)), (next, Some(101.0))]))
        }
    }

    struct SpyOnlyCharts;

    #[async_trait::async_trait]
    impl ValidationSeriesSource for SpyOnlyCharts {
        async fn load(&self, instrument: Instrument) -> anyhow::Result<Vec<ValidationPoint>> {
            anyhow::ensure!(instrument == Instrument::Spy, "no validation series for {instrument}");
            Ok(vec![ValidationPoint {
                date: NaiveDate::from_ymd_opt(2025, 4, 24).unwrap(),
                actual: 6.0e7,
                predicted: 5.8e7,
            }])
        }
    }

    fn state(features: StubFeatures, market: StubMarket) -> AppState {
        let mut models = ModelRegistry::default();
        for instrument in Instrument::ALL {
            let artifact: ModelArtifact = serde_json::from_value(serde_json::json!({
                "kind": "linear",
                "feature_names": MODEL_FEATURES,
                "intercept": 16.0,
                "coefficients": vec![0.01; MODEL_FEATURES.len()],
            }))
            .unwrap();
            models.insert(instrument, Arc::new(artifact));
        }

        AppState {
            services: Some(Arc::new(Services {
                features: Box::new(features),
                market: Box::new(market),
                models,
                charts: ChartRenderer::new(Box::new(SpyOnlyCharts)),
                max_lookback_days: 5,
            })),
        }
    }

    fn healthy() -> AppState {
        state(StubFeatures::default(), StubMarket { empty: false })
    }

    fn status<T>(res: Result<T, ApiError>) -> StatusCode {
        match res {
            Ok(_) => StatusCode::OK,
            Err((status, _)) => status,
        }
    }

    async fn features_status(state: AppState, date: &str, instrument: &str) -> StatusCode {
        status(get_features(State(state), Path((date.to_string(), instrument.to_string()))).await)
    }

    async fn predictions(state: AppState, date: &str) -> Result<Json<PredictionSet>, ApiError> {
        get_predictions(State(state), Path(date.to_string())).await
    }

    async fn chart_status(state: AppState, instrument: &str) -> StatusCode {
        status(get_chart(State(state), Path(instrument.to_string())).await)
    }

    #[tokio::test]
    async fn features_endpoint_maps_each_failure() {
        assert_eq!(features_status(healthy(), "2025-04-25", "spy").await, StatusCode::OK);
        assert_eq!(features_status(healthy(), "2025/04/25", "SPY").await, StatusCode::BAD_REQUEST);
        assert_eq!(features_status(healthy(), "2025-04-25", "QQQ").await, StatusCode::BAD_REQUEST);
        assert_eq!(features_status(healthy(), "2026-01-02", "SPY").await, StatusCode::BAD_REQUEST);

        let missing = state(
            StubFeatures {
                missing: vec![Instrument::Spy],
                ..StubFeatures::default()
            },
            StubMarket { empty: false },
        );
        assert_eq!(features_status(missing, "2025-04-25", "SPY").await, StatusCode::NOT_FOUND);

        let broken = state(
            StubFeatures {
                broken: true,
                ..StubFeatures::default()
            },
            StubMarket { empty: false },
        );
        assert_eq!(features_status(broken, "2025-04-25", "SPY").await, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn predictions_endpoint_returns_all_instruments() {
        let Json(set) = predictions(healthy(), "2025-04-25").await.unwrap();
        assert_eq!(set.predictions.len(), 3);
        for p in &set.predictions {
            assert!(p.pred_log.is_finite());
            assert!(p.pred_vol >= -1.0);
        }
    }

    #[tokio::test]
    async fn missing_feature_row_is_not_found_for_predictions() {
        let missing = state(
            StubFeatures {
                missing: vec![Instrument::Spy],
                ..StubFeatures::default()
            },
            StubMarket { empty: false },
        );
        let (status, message) = predictions(missing, "2025-04-25").await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Failed to fetch features: no feature row for SPY on 2025-04-25");
    }

    #[tokio::test]
    async fn predictions_endpoint_maps_remaining_failures() {
        let no_closes = state(StubFeatures::default(), StubMarket { empty: true });
        let (code, message) = predictions(no_closes, "2025-04-25").await.unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert!(message.contains("unable to find lag return for SPY on 2025-04-25"));

        let broken = state(
            StubFeatures {
                broken: true,
                ..StubFeatures::default()
            },
            StubMarket { empty: false },
        );
        assert_eq!(status(predictions(broken, "2025-04-25").await), StatusCode::BAD_GATEWAY);

        assert_eq!(status(predictions(healthy(), "not-a-date").await), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(predictions(healthy(), "+262142-12-31").await),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn chart_endpoint_serves_svg_or_maps_failures() {
        let res = get_chart(State(healthy()), Path("SPY.svg".to_string()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/svg+xml");

        assert_eq!(chart_status(healthy(), "QQQ").await, StatusCode::BAD_REQUEST);
        assert_eq!(chart_status(healthy(), "UPRO").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn degraded_mode_is_service_unavailable() {
        let degraded = AppState { services: None };
        assert_eq!(
            features_status(degraded.clone(), "2025-04-25", "SPY").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(predictions(degraded.clone(), "2025-04-25").await),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(chart_status(degraded, "SPY").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn features_page_reports_unknown_instrument() {
        let q = PageQuery {
            date: Some("2025-04-25".to_string()),
            instrument: Some("QQQ".to_string()),
        };
        let Html(page) = features_page(State(healthy()), Query(q)).await;
        assert!(page.contains(r#"class="error""#));
        assert!(page.contains("unknown instrument"));
        assert!(!page.contains("Features successfully generated"));
    }

    #[tokio::test]
    async fn features_page_renders_table_for_valid_query() {
        let q = PageQuery {
            date: Some("2025-04-25".to_string()),
            instrument: Some("sso".to_string()),
        };
        let Html(page) = features_page(State(healthy()), Query(q)).await;
        assert!(page.contains("Features successfully generated"));
        assert!(page.contains(r#"<option value="SSO" selected>"#));
    }
}
