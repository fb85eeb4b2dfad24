//! Pivot smoothing.
//!
//! Walks the raw pivots left to right with a single "last accepted pivot"
//! cursor. Same-type pivots only survive if they extend the cursor, and the
//! one they extend is dropped; opposite-type pivots only survive if they move
//! more than `threshold_pct` away from the cursor. The result alternates
//! between peaks and troughs.

use super::{AlgoError, AnnotatedPoint, PivotKind};

/// Last accepted pivot.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    kind: PivotKind,
    index: usize,
    price: f64,
}

fn extends(kind: PivotKind, price: f64, previous: f64) -> bool {
    match kind {
        PivotKind::Peak => price > previous,
        PivotKind::Trough => price < previous,
    }
}

fn accepts(cursor: Option<Cursor>, kind: PivotKind, price: f64, threshold_pct: f64) -> bool {
    match cursor {
        None => true,
        Some(last) if last.kind == kind => extends(kind, price, last.price),
        Some(last) => {
            let ratio = price / last.price;
            ratio > 1.0 + threshold_pct || ratio < 1.0 - threshold_pct
        }
    }
}

/// Evaluate one candidate and return the updated cursor.
fn step(
    out: &mut [AnnotatedPoint],
    cursor: Option<Cursor>,
    index: usize,
    kind: PivotKind,
    threshold_pct: f64,
) -> Option<Cursor> {
    let candidate = out[index].raw(kind).filter(|price| !price.is_nan());

    match candidate {
        Some(price) if accepts(cursor, kind, price, threshold_pct) => {
            if let Some(last) = cursor.filter(|last| last.kind == kind) {
                *out[last.index].smoothed_mut(kind) = None;
            }
            *out[index].smoothed_mut(kind) = Some(price);
            Some(Cursor { kind, index, price })
        }
        _ => {
            *out[index].smoothed_mut(kind) = None;
            cursor
        }
    }
}

/// Fill `smooth_peak` / `smooth_trough` from the raw pivots.
///
/// At an index carrying both a peak and a trough, the peak is evaluated
/// first and the trough is tested against the cursor it leaves behind.
/// `threshold_pct` is a fraction in (0, 1), e.g. `0.03` for 3%.
pub fn smoothen(
    series: &[AnnotatedPoint],
    threshold_pct: f64,
) -> Result<Vec<AnnotatedPoint>, AlgoError> {
    if !(threshold_pct > 0.0 && threshold_pct < 1.0) {
        return Err(AlgoError::InvalidThreshold(threshold_pct));
    }

    let mut out = series.to_vec();

    (0..out.len()).fold(None, |cursor, index| {
        let cursor = step(&mut out, cursor, index, PivotKind::Peak, threshold_pct);
        step(&mut out, cursor, index, PivotKind::Trough, threshold_pct)
    });

    Ok(out)
}
