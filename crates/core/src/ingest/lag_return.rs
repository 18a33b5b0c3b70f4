use crate::domain::instrument::Instrument;
use crate::ingest::market::MarketDataClient;
use crate::time::us_market::{is_weekend, lookback_window};
use anyhow::Context;
use chrono::NaiveDate;
use std::fmt;

pub const DEFAULT_MAX_LOOKBACK_DAYS: u32 = 5;

/// No log return could be computed in any lookback window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagReturnNotFound {
    pub instrument: Instrument,
    pub date: NaiveDate,
    pub max_lookback_days: u32,
}

impl fmt::Display for LagReturnNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unable to find lag return for {} on {}",
            self.instrument, self.date
        )
    }
}

impl std::error::Error for LagReturnNotFound {}

/// Resolves the lag return for `instrument` on `date`.
///
/// Widens the window `[date - delta, date + 1)` one calendar day at a time
/// for `delta` in `1..=max_lookback_days` and returns the last non-missing
/// log return of the first window that has one. Market-data errors are
/// propagated as-is; only empty windows move on to the next delta.
pub async fn resolve_lag_return(
    market: &dyn MarketDataClient,
    instrument: Instrument,
    date: NaiveDate,
    max_lookback_days: u32,
) -> anyhow::Result<f64> {
    for delta in 1..=max_lookback_days {
        let (start, end) = lookback_window(date, delta)?;
        let series = market
            .daily_closes(instrument, start, end)
            .await
            .with_context(|| format!("failed to fetch closes for {instrument} from {start} to {end}"))?;

        if let Some(ret) = series.last_log_return() {
            tracing::debug!(%instrument, %date, delta, lag_return = ret, "lag return resolved");
            return Ok(ret);
        }

        tracing::debug!(
            %instrument,
            %date,
            delta,
            points = series.len(),
            weekend = is_weekend(start),
            "no return in lookback window; widening"
        );
    }

    Err(LagReturnNotFound {
        instrument,
        date,
        max_lookback_days,
    }
    .into())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ingest::types::PriceSeries;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory closes keyed by date; records every requested window.
    #[derive(Default)]
    pub(crate) struct FakeMarket {
        pub closes: BTreeMap<(Instrument, NaiveDate), Option<f64>>,
        pub calls: Mutex<Vec<(Instrument, NaiveDate, NaiveDate)>>,
        pub fail: bool,
    }

    impl FakeMarket {
        pub(crate) fn with_closes(instrument: Instrument, closes: &[(NaiveDate, Option<f64>)]) -> Self {
            let mut market = Self::default();
            market.add(instrument, closes);
            market
        }

        pub(crate) fn add(&mut self, instrument: Instrument, closes: &[(NaiveDate, Option<f64>)]) {
            for (d, c) in closes {
                self.closes.insert((instrument, *d), *c);
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl MarketDataClient for FakeMarket {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn daily_closes(
            &self,
            instrument: Instrument,
            start: NaiveDate,
            end: NaiveDate,
        ) -> anyhow::Result<PriceSeries> {
            self.calls.lock().unwrap().push((instrument, start, end));
            anyhow::ensure!(!self.fail, "market data unavailable");
            let points = self
                .closes
                .range((instrument, start)..(instrument, end))
                .map(|((_, d), c)| (*d, *c))
                .collect();
            Ok(PriceSeries::new(points))
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
    }

    #[tokio::test]
    async fn resolves_at_first_delta_without_scanning_further() {
        let market = FakeMarket::with_closes(
            Instrument::Spy,
            &[(d(22), Some(90.0)), (d(24), Some(100.0)), (d(25), Some(102.0))],
        );

        let ret = resolve_lag_return(&market, Instrument::Spy, d(25), 5).await.unwrap();
        assert!((ret - (102.0_f64 / 100.0).ln()).abs() < 1e-12);
        assert_eq!(market.call_count(), 1);
        assert_eq!(
            market.calls.lock().unwrap()[0],
            (Instrument::Spy, d(24), d(26))
        );
    }

    #[tokio::test]
    async fn widens_across_a_weekend() {
        // 2025-04-28 is Monday; nothing on the weekend, Friday and Monday exist.
        let monday = NaiveDate::from_ymd_opt(2025, 4, 28).unwrap();
        let market = FakeMarket::with_closes(
            Instrument::Sso,
            &[(d(24), Some(80.0)), (d(25), Some(84.0)), (monday, None)],
        );

        let ret = resolve_lag_return(&market, Instrument::Sso, monday, 5).await.unwrap();
        assert!((ret - (84.0_f64 / 80.0).ln()).abs() < 1e-12);
        // delta=3 reaches Friday alone; delta=4 is the first with a Thu->Fri step.
        assert_eq!(market.call_count(), 4);
    }

    #[tokio::test]
    async fn fails_with_named_error_after_five_empty_windows() {
        let market = FakeMarket::default();

        let err = resolve_lag_return(&market, Instrument::Spy, d(25), 5)
            .await
            .unwrap_err();
        let not_found = err.downcast_ref::<LagReturnNotFound>().unwrap();
        assert_eq!(not_found.instrument, Instrument::Spy);
        assert_eq!(not_found.date, d(25));

        assert_eq!(err.to_string(), "unable to find lag return for SPY on 2025-04-25");
        assert_eq!(market.call_count(), 5);
        assert_eq!(market.calls.lock().unwrap()[4].1, d(20));
    }

    #[tokio::test]
    async fn data_older_than_lookback_is_never_used() {
        let market = FakeMarket::with_closes(
            Instrument::Upro,
            &[(d(18), Some(60.0)), (d(19), Some(61.0))],
        );
        let err = resolve_lag_return(&market, Instrument::Upro, d(25), 5)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<LagReturnNotFound>().is_some());
    }

    #[tokio::test]
    async fn out_of_range_dates_fail_without_panicking() {
        let market = FakeMarket::default();

        for date in [NaiveDate::MAX, NaiveDate::MIN] {
            let err = resolve_lag_return(&market, Instrument::Spy, date, 5)
                .await
                .unwrap_err();
            assert!(err.downcast_ref::<LagReturnNotFound>().is_none());
            assert!(err.to_string().contains("out of range"));
        }
        assert_eq!(market.call_count(), 0);
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let market = FakeMarket {
            fail: true,
            ..FakeMarket::default()
        };
        let err = resolve_lag_return(&market, Instrument::Spy, d(25), 5)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<LagReturnNotFound>().is_none());
        assert_eq!(market.call_count(), 1);
    }
}
