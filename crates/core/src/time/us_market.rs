use anyhow::{ensure, Context};
use chrono::{Datelike, Duration, NaiveDate};

/// Feature lookup is limited to the span the feature table was built for.
pub const FEATURE_DATE_MIN: NaiveDate = match NaiveDate::from_ymd_opt(2010, 1, 1) {
    Some(d) => d,
    None => panic!("invalid FEATURE_DATE_MIN"),
};
pub const FEATURE_DATE_MAX: NaiveDate = match NaiveDate::from_ymd_opt(2025, 12, 31) {
    Some(d) => d,
    None => panic!("invalid FEATURE_DATE_MAX"),
};

/// Date pre-filled in the date pickers.
pub const DEFAULT_TARGET_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2025, 4, 25) {
    Some(d) => d,
    None => panic!("invalid DEFAULT_TARGET_DATE"),
};

pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"))
}

/// Parses an optional date argument, falling back to [`DEFAULT_TARGET_DATE`].
pub fn resolve_target_date(date_arg: Option<&str>) -> anyhow::Result<NaiveDate> {
    match date_arg.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_date(s),
        None => Ok(DEFAULT_TARGET_DATE),
    }
}

pub fn ensure_feature_date_in_range(date: NaiveDate) -> anyhow::Result<()> {
    ensure!(
        (FEATURE_DATE_MIN..=FEATURE_DATE_MAX).contains(&date),
        "date {date} is outside the supported range {FEATURE_DATE_MIN}..={FEATURE_DATE_MAX}"
    );
    Ok(())
}

/// Half-open daily window `[date - delta, date + 1)` scanned by the
/// lag-return lookback.
pub fn lookback_window(date: NaiveDate, delta_days: u32) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let start = date
        .checked_sub_signed(Duration::days(i64::from(delta_days)))
        .with_context(|| format!("lookback of {delta_days} days before {date} is out of range"))?;
    let end = date
        .checked_add_signed(Duration::days(1))
        .with_context(|| format!("day after {date} is out of range"))?;
    Ok((start, end))
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}
