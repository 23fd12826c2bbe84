//! Tolerance-based geometry matching

use crate::engine::{AnnotRef, AnnotationEngine};
use crate::error::Result;
use crate::geometry::{quad_to_viewer, NativeRect, Point, Rectangle};

/// Whether an annotation's quads match `targets` one-to-one
///
/// Each quad is reduced to its bounding box and flipped into viewer space,
/// then compared with the target at the same position, every edge within
/// `tolerance`. Counts must be equal.
pub(crate) fn geometry_matches<E: AnnotationEngine>(
    engine: &E,
    page: u32,
    annot: AnnotRef,
    targets: &[Rectangle],
    page_height: f64,
    tolerance: f64,
) -> Result<bool> {
    let quads = engine.quad_points(page, annot)?;
    if quads.len() != targets.len() {
        return Ok(false);
    }
    Ok(quads
        .iter()
        .zip(targets)
        .all(|(quad, target)| quad_to_viewer(quad, page_height).approx_eq(target, tolerance)))
}

/// Whether a point note's anchor sits at `(x, y)`, both axes within `tolerance`
pub(crate) fn position_matches(rect: &NativeRect, at: Point, tolerance: f64) -> bool {
    (rect.x0 - at.x).abs() < tolerance && (rect.y0 - at.y).abs() < tolerance
}
