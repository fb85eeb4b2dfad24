//! Raw pivot detection.
//!
//! A peak is a bar whose high is strictly above both neighbors' highs; a
//! trough is a bar whose low is strictly below both neighbors' lows. The
//! first and last bars have only one neighbor and are never pivots.

use super::AnnotatedPoint;
use crate::data::PricePoint;

fn is_peak(prev: f64, curr: f64, next: f64) -> bool {
    curr - prev > 0.0 && next - curr < 0.0
}

fn is_trough(prev: f64, curr: f64, next: f64) -> bool {
    curr - prev < 0.0 && next - curr > 0.0
}

/// Annotate every point with its raw peak (its high) and trough (its low).
///
/// Series shorter than three points come back without pivots. Smoothed
/// annotations are left empty.
pub fn detect_pivots(series: &[PricePoint]) -> Vec<AnnotatedPoint> {
    let mut annotated: Vec<AnnotatedPoint> =
        series.iter().copied().map(AnnotatedPoint::new).collect();

    for (offset, window) in series.windows(3).enumerate() {
        let [prev, curr, next] = [window[0], window[1], window[2]];
        let target = &mut annotated[offset + 1];

        if is_peak(prev.high, curr.high, next.high) {
            target.peak = Some(curr.high);
        }
        if is_trough(prev.low, curr.low, next.low) {
            target.trough = Some(curr.low);
        }
    }

    annotated
}
