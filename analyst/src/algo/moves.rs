//! X-times move scanner.
//!
//! Looks for a smoothed trough followed, at any later pivot, by a smoothed
//! peak at least `multiple` times its price.

use super::{AlgoError, AnnotatedPoint};

/// Floor that lets every trough start a scan.
pub const NO_MIN_PRICE: f64 = f64::NEG_INFINITY;

/// Whether price rose at least `multiple` times from some trough to a later peak.
///
/// Only rows carrying a smoothed pivot are considered, and troughs below
/// `min_price` never start a scan. Returns on the earliest qualifying trough,
/// together with the pivot-only series that was scanned.
pub fn has_multiple_move(
    series: &[AnnotatedPoint],
    multiple: f64,
    min_price: f64,
) -> Result<(bool, Vec<AnnotatedPoint>), AlgoError> {
    if !(multiple.is_finite() && multiple > 0.0) {
        return Err(AlgoError::InvalidMultiple(multiple));
    }
    if min_price.is_nan() {
        return Err(AlgoError::InvalidMinPrice(min_price));
    }

    let pivots: Vec<AnnotatedPoint> = series
        .iter()
        .filter(|p| p.is_smoothed_pivot())
        .copied()
        .collect();

    let found = pivots.iter().enumerate().any(|(i, point)| {
        let Some(trough) = point.smooth_trough.filter(|t| !t.is_nan() && *t >= min_price) else {
            return false;
        };
        let target = trough * multiple;
        pivots[i + 1..]
            .iter()
            .filter_map(|later| later.smooth_peak)
            .any(|peak| peak >= target)
    });

    Ok((found, pivots))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use test_case::test_case;

    fn pivots(points: &[(Option<f64>, Option<f64>)]) -> Vec<AnnotatedPoint> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(peak, trough))| smoothed_point(i as i64, peak, trough))
            .collect()
    }

    #[test_case(&[(None, Some(10.0)), (Some(25.0), None)], 2.0, -1.0 => true; "doubles")]
    #[test_case(&[(None, Some(10.0)), (Some(15.0), None)], 2.0, -1.0 => false; "falls short")]
    #[test_case(&[(None, Some(10.0)), (Some(20.0), None)], 2.0, NO_MIN_PRICE => true; "exactly the multiple")]
    #[test_case(&[(Some(25.0), None), (None, Some(10.0))], 2.0, NO_MIN_PRICE => false; "peak before trough")]
    #[test_case(&[(None, Some(10.0)), (Some(25.0), None)], 2.0, 12.0 => false; "trough below floor")]
    #[test_case(&[(None, Some(10.0)), (Some(12.0), None), (None, Some(11.0)), (Some(30.0), None)], 2.0, NO_MIN_PRICE => true; "later peak qualifies")]
    #[test_case(&[(Some(40.0), Some(10.0))], 2.0, NO_MIN_PRICE => false; "same row peak is not later")]
    #[test_case(&[], 2.0, NO_MIN_PRICE => false; "empty")]
    fn test_has_multiple_move(points: &[(Option<f64>, Option<f64>)], multiple: f64, min_price: f64) -> bool {
        has_multiple_move(&pivots(points), multiple, min_price).unwrap().0
    }

    #[test]
    fn test_reduces_to_pivot_rows() {
        let series = pivots(&[(None, None), (None, Some(10.0)), (None, None), (Some(25.0), None)]);
        let (found, reduced) = has_multiple_move(&series, 2.0, NO_MIN_PRICE).unwrap();
        assert!(found);
        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0].smooth_trough, Some(10.0));
        assert_eq!(reduced[1].smooth_peak, Some(25.0));
    }

    #[test]
    fn test_raw_annotations_ignored() {
        let series = vec![
            AnnotatedPoint {
                trough: Some(10.0),
                ..AnnotatedPoint::new(bar(0, 10.0, 10.0))
            },
            AnnotatedPoint {
                peak: Some(50.0),
                ..AnnotatedPoint::new(bar(1, 50.0, 50.0))
            },
        ];
        let (found, reduced) = has_multiple_move(&series, 2.0, NO_MIN_PRICE).unwrap();
        assert!(!found);
        assert!(reduced.is_empty());
    }

    #[test]
    fn test_argument_validation() {
        let series = pivots(&[(None, Some(10.0))]);
        assert_eq!(
            has_multiple_move(&series, 0.0, NO_MIN_PRICE),
            Err(AlgoError::InvalidMultiple(0.0))
        );
        assert!(has_multiple_move(&series, -2.0, NO_MIN_PRICE).is_err());
        assert!(has_multiple_move(&series, f64::INFINITY, NO_MIN_PRICE).is_err());
        assert!(has_multiple_move(&series, 2.0, f64::NAN).is_err());
    }
}
