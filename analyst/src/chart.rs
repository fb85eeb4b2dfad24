//! Chart data for the dashboard.
//!
//! The dashboard draws candles client-side, so a chart is the trailing
//! window of daily bars annotated with raw and smoothed pivots.

use serde::Serialize;

use crate::algo::{detect_pivots, smoothen, AlgoError, AnnotatedPoint};
use crate::data::PricePoint;

/// Annotated candles for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub symbol: String,
    /// Bars requested; `candles` may hold fewer
    pub days: usize,
    pub threshold_pct: f64,
    pub candles: Vec<AnnotatedPoint>,
}

impl ChartData {
    /// Annotate the last `days` bars of `prices` (ascending by time).
    ///
    /// Pivots are detected inside the window only, so the first and last
    /// bars shown never carry a raw pivot.
    pub fn build(
        symbol: impl Into<String>,
        prices: &[PricePoint],
        days: usize,
        threshold_pct: f64,
    ) -> Result<Self, AlgoError> {
        let window = &prices[prices.len().saturating_sub(days)..];
        let candles = smoothen(&detect_pivots(window), threshold_pct)?;

        Ok(Self {
            symbol: symbol.into(),
            days,
            threshold_pct,
            candles,
        })
    }

    /// Candles carrying a smoothed pivot.
    pub fn pivot_count(&self) -> usize {
        self.candles.iter().filter(|c| c.is_smoothed_pivot()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::test_support::series;

    #[test]
    fn test_takes_trailing_window() {
        let prices = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let chart = ChartData::build("ABC", &prices, 4, 0.05).unwrap();

        assert_eq!(chart.candles.len(), 4);
        assert_eq!(chart.candles[0].point, prices[2]);
        assert_eq!(chart.candles[3].point, prices[5]);
    }

    #[test]
    fn test_short_history_keeps_everything() {
        let prices = series(&[1.0, 2.0]);
        let chart = ChartData::build("ABC", &prices, 100, 0.05).unwrap();
        assert_eq!(chart.candles.len(), 2);
        assert_eq!(chart.days, 100);
        assert_eq!(chart.pivot_count(), 0);
    }

    #[test]
    fn test_marks_smoothed_pivots() {
        let prices = series(&[10.0, 20.0, 10.0, 30.0, 10.0]);
        let chart = ChartData::build("ABC", &prices, 100, 0.05).unwrap();

        assert_eq!(chart.candles[1].smooth_peak, Some(20.5));
        assert_eq!(chart.candles[2].smooth_trough, Some(9.5));
        assert_eq!(chart.candles[3].smooth_peak, Some(30.5));
        assert_eq!(chart.pivot_count(), 3);
    }

    #[test]
    fn test_pivots_ignore_bars_outside_window() {
        // 20 is a peak in the full series but the window starts on it
        let prices = series(&[10.0, 20.0, 15.0, 18.0, 12.0]);
        let chart = ChartData::build("ABC", &prices, 4, 0.05).unwrap();
        assert_eq!(chart.candles[0].peak, None);
        assert_eq!(chart.candles[1].trough, Some(14.5));
    }

    #[test]
    fn test_invalid_threshold() {
        let prices = series(&[1.0, 2.0, 1.0]);
        assert_eq!(
            ChartData::build("ABC", &prices, 10, 1.0).unwrap_err(),
            AlgoError::InvalidThreshold(1.0)
        );
    }

    #[test]
    fn test_json_shape() {
        let prices = series(&[1.0, 2.0, 1.0]);
        let json = serde_json::to_value(ChartData::build("ABC", &prices, 10, 0.05).unwrap()).unwrap();
        assert_eq!(json["symbol"], "ABC");
        assert_eq!(json["candles"].as_array().unwrap().len(), 3);
        assert!(json["candles"][1]["smooth_peak"].is_number());
    }
}
