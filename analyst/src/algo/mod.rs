//! Screening algorithms over in-memory series.
//!
//! Everything here is pure and synchronous: inputs are borrowed, outputs are
//! fresh annotated copies, and nothing is shared between calls.
//!
//! ```text
//! prices ──▶ detect_pivots ──▶ smoothen ──▶ has_multiple_move ──▶ verdict
//! statements ──▶ yoy_growth_at_least ──▶ verdict
//! ```

pub mod growth;
pub mod moves;
pub mod pivots;
pub mod smoothing;

pub use growth::{preprocess_financials, yoy_growth_at_least};
pub use moves::{has_multiple_move, NO_MIN_PRICE};
pub use pivots::detect_pivots;
pub use smoothing::smoothen;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::PricePoint;

/// Invalid arguments to a screening algorithm.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlgoError {
    #[error("Invalid threshold {0}: must be between 0 and 1 (exclusive)")]
    InvalidThreshold(f64),

    #[error("Invalid multiple {0}: must be a positive number")]
    InvalidMultiple(f64),

    #[error("Invalid minimum price {0}")]
    InvalidMinPrice(f64),

    #[error("Invalid growth threshold {0}: must be a finite number")]
    InvalidGrowthThreshold(f64),

    #[error("Metric name must not be empty")]
    EmptyMetric,
}

/// Pivot type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    Peak,
    Trough,
}

/// A price point with raw and smoothed pivot annotations.
///
/// `None` means "not a pivot here"; a point may carry both a peak and a trough.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPoint {
    #[serde(flatten)]
    pub point: PricePoint,
    pub peak: Option<f64>,
    pub trough: Option<f64>,
    pub smooth_peak: Option<f64>,
    pub smooth_trough: Option<f64>,
}

impl AnnotatedPoint {
    /// Unannotated point.
    pub fn new(point: PricePoint) -> Self {
        Self {
            point,
            peak: None,
            trough: None,
            smooth_peak: None,
            smooth_trough: None,
        }
    }

    /// Raw annotation of the given kind.
    pub fn raw(&self, kind: PivotKind) -> Option<f64> {
        match kind {
            PivotKind::Peak => self.peak,
            PivotKind::Trough => self.trough,
        }
    }

    /// Smoothed annotation of the given kind.
    pub fn smoothed(&self, kind: PivotKind) -> Option<f64> {
        match kind {
            PivotKind::Peak => self.smooth_peak,
            PivotKind::Trough => self.smooth_trough,
        }
    }

    fn smoothed_mut(&mut self, kind: PivotKind) -> &mut Option<f64> {
        match kind {
            PivotKind::Peak => &mut self.smooth_peak,
            PivotKind::Trough => &mut self.smooth_trough,
        }
    }

    /// Whether any smoothed pivot sits on this point.
    pub fn is_smoothed_pivot(&self) -> bool {
        self.smooth_peak.is_some() || self.smooth_trough.is_some()
    }
}

/// Smoothed pivots in temporal order, peak before trough at a shared index.
pub fn smoothed_sequence(series: &[AnnotatedPoint]) -> Vec<(usize, PivotKind, f64)> {
    series
        .iter()
        .enumerate()
        .flat_map(|(i, p)| {
            [PivotKind::Peak, PivotKind::Trough]
                .into_iter()
                .filter_map(move |kind| p.smoothed(kind).map(|price| (i, kind, price)))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Daily bar with the given high and low; open/close at the midpoint.
    pub fn bar(day: i64, high: f64, low: f64) -> PricePoint {
        let mid = (high + low) / 2.0;
        PricePoint {
            timestamp: day * 86_400_000,
            open: mid,
            high,
            low,
            close: mid,
            volume: 1_000.0,
        }
    }

    /// Series whose highs and lows both follow `prices` (a 1.0 spread).
    pub fn series(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| bar(i as i64, p + 0.5, p - 0.5))
            .collect()
    }

    /// Point with smoothed annotations only, as seen by the move scanner.
    pub fn smoothed_point(day: i64, peak: Option<f64>, trough: Option<f64>) -> AnnotatedPoint {
        let price = peak.or(trough).unwrap_or(1.0);
        AnnotatedPoint {
            smooth_peak: peak,
            smooth_trough: trough,
            ..AnnotatedPoint::new(bar(day, price, price))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_annotated_point_json_shape() {
        let point = AnnotatedPoint {
            peak: Some(12.0),
            ..AnnotatedPoint::new(bar(1, 12.0, 10.0))
        };
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["timestamp"], 86_400_000);
        assert_eq!(json["high"], 12.0);
        assert_eq!(json["peak"], 12.0);
        assert!(json["trough"].is_null());
        assert!(json["smooth_peak"].is_null());
    }

    #[test]
    fn test_smoothed_sequence_orders_peak_first() {
        let points = vec![
            smoothed_point(0, None, Some(5.0)),
            smoothed_point(1, Some(9.0), Some(4.0)),
            smoothed_point(2, None, None),
        ];
        let seq: Vec<PivotKind> = smoothed_sequence(&points).into_iter().map(|(_, k, _)| k).collect();
        assert_eq!(seq, vec![PivotKind::Trough, PivotKind::Peak, PivotKind::Trough]);
    }
}
