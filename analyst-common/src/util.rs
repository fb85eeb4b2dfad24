//! Utility functions shared by the tasks and the dashboard.

use chrono::{Duration, NaiveDate};

/// ISO date format used by the market data API.
pub const ISO_DATE: &str = "%Y-%m-%d";

/// Date range of `n_days` ending at `close`: `(close - n_days, close)`.
///
/// A negative `n_days` yields an open date after the close date.
pub fn date_window(close: NaiveDate, n_days: i64) -> (NaiveDate, NaiveDate) {
    (close - Duration::days(n_days), close)
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, ISO_DATE)
}

/// Format a fraction as a percentage number rounded to two decimals.
pub fn format_pct(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 100.0
}

/// Format a number with a magnitude suffix, e.g. `1234567.0` → `"1.23M"`.
pub fn format_num(n: f64) -> String {
    const SUFFIXES: [&str; 6] = ["", "K", "M", "G", "T", "P"];

    let mut value = n;
    let mut magnitude = 0;
    while value.abs() >= 1000.0 && magnitude < SUFFIXES.len() - 1 {
        magnitude += 1;
        value /= 1000.0;
    }
    format!("{:.2}{}", value, SUFFIXES[magnitude])
}

/// Replace the value of an `apikey` query parameter so URLs can be logged.
pub fn redact_api_key(url: &str) -> String {
    let Some(start) = url.find("apikey=") else {
        return url.to_string();
    };
    let value_start = start + "apikey=".len();
    let value_end = url[value_start..]
        .find('&')
        .map_or(url.len(), |offset| value_start + offset);
    format!("{}***{}", &url[..value_start], &url[value_end..])
}
