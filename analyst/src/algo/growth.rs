//! Year-over-year growth on quarterly financial statements.
//!
//! Four quarterly records make a year, so the prior-year value of record `i`
//! is record `i - 4` once the records are sorted by date.

use super::AlgoError;
use crate::data::FinancialRecord;

/// Records back to the same quarter of the previous year.
const QUARTERS_PER_YEAR: usize = 4;

/// Metrics given a plain percentage-change column by `preprocess_financials`.
pub const PREPROCESSED_METRICS: &[&str] = &["revenue", "netIncome", "epsdiluted"];

/// How the prior-year value divides the change.
#[derive(Debug, Clone, Copy)]
enum Base {
    /// `(v - prev) / |prev|`: a smaller loss counts as growth
    Absolute,
    /// `(v - prev) / prev`
    Signed,
}

fn yoy_change(current: Option<f64>, previous: Option<f64>, base: Base) -> Option<f64> {
    let (current, previous) = (current?, previous?);
    let denominator = match base {
        Base::Absolute => previous.abs(),
        Base::Signed => previous,
    };
    let change = (current - previous) / denominator;
    change.is_finite().then_some(change)
}

fn sorted_by_date(records: &[FinancialRecord]) -> Vec<FinancialRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.date.cmp(&b.date));
    sorted
}

/// Add a year-over-year change column for `metric` to records already sorted by date.
fn add_yoy_column(records: &mut [FinancialRecord], metric: &str, column: &str, base: Base) {
    let values: Vec<Option<f64>> = records.iter().map(|r| r.metric(metric)).collect();

    for (i, record) in records.iter_mut().enumerate() {
        let change = i
            .checked_sub(QUARTERS_PER_YEAR)
            .and_then(|prev| yoy_change(values[i], values[prev], base));
        record.set_metric(column, change);
    }
}

/// Whether the latest record grew at least `threshold_pct` over the same quarter a year earlier.
///
/// Returns the verdict and the records sorted ascending by date with a
/// `{metric}YoYChangePct` column (null where undefined). Fewer than five
/// records, a missing value, or a zero prior-year value means the filter
/// does not pass.
pub fn yoy_growth_at_least(
    records: &[FinancialRecord],
    metric: &str,
    threshold_pct: f64,
) -> Result<(bool, Vec<FinancialRecord>), AlgoError> {
    if metric.is_empty() {
        return Err(AlgoError::EmptyMetric);
    }
    if !threshold_pct.is_finite() {
        return Err(AlgoError::InvalidGrowthThreshold(threshold_pct));
    }

    let column = format!("{metric}YoYChangePct");
    let mut sorted = sorted_by_date(records);
    add_yoy_column(&mut sorted, metric, &column, Base::Absolute);

    let passed = sorted
        .last()
        .and_then(|latest| latest.metric(&column))
        .is_some_and(|change| change >= threshold_pct);

    Ok((passed, sorted))
}

/// Sort statements by date and add `{metric}YoYChange` columns for
/// revenue, net income, and diluted EPS.
pub fn preprocess_financials(records: &[FinancialRecord]) -> Vec<FinancialRecord> {
    let mut sorted = sorted_by_date(records);
    for metric in PREPROCESSED_METRICS {
        add_yoy_column(&mut sorted, metric, &format!("{metric}YoYChange"), Base::Signed);
    }
    sorted
}
