//! Conservative self-intersection test for dense closed curves.
//!
//! The curve is cut into `2^PRESPLIT_ORDER` contiguous arcs and every
//! unordered pair of arcs is compared by recursive bisection of their
//! axis-aligned bounding boxes. Overlapping boxes at or below the
//! subdivision threshold count as a crossing, so the test can report false
//! positives near that resolution but will not miss a large fold.

use nalgebra::Point2;

use crate::types::PRESPLIT_ORDER;

/// Axis-aligned bounding box of a run of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl BoundingBox {
    /// Box around `points`, `None` for an empty slice.
    pub fn from_points(points: &[Point2<f64>]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = BoundingBox {
            min: *first,
            max: *first,
        };
        for p in &points[1..] {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    /// Closed-interval overlap on both axes; touching boxes overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        ranges_overlap(self.min.x, self.max.x, other.min.x, other.max.x)
            && ranges_overlap(self.min.y, self.max.y, other.min.y, other.max.y)
    }
}

fn ranges_overlap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> bool {
    a_min <= b_max && b_min <= a_max
}

/// Split an arc at its midpoint, returning `(second half, first half)`.
fn halve(arc: &[Point2<f64>]) -> (&[Point2<f64>], &[Point2<f64>]) {
    let (head, tail) = arc.split_at(arc.len() / 2);
    (tail, head)
}

/// Cut `arc` into `2^order` contiguous pieces by repeated bisection.
fn presplit(arc: &[Point2<f64>], order: u32) -> Vec<&[Point2<f64>]> {
    if order == 0 {
        return vec![arc];
    }
    let (a, b) = halve(arc);
    let mut pieces = presplit(a, order - 1);
    pieces.extend(presplit(b, order - 1));
    pieces
}

/// Recursive box test between two arcs.
fn arcs_intersect(a: &[Point2<f64>], b: &[Point2<f64>], threshold: usize) -> bool {
    let (Some(box_a), Some(box_b)) = (BoundingBox::from_points(a), BoundingBox::from_points(b))
    else {
        return false;
    };
    if !box_a.overlaps(&box_b) {
        return false;
    }
    if a.len() <= threshold || b.len() <= threshold {
        return true;
    }

    let (a1, a2) = halve(a);
    let (b1, b2) = halve(b);
    arcs_intersect(a1, b1, threshold)
        || arcs_intersect(a1, b2, threshold)
        || arcs_intersect(a2, b1, threshold)
        || arcs_intersect(a2, b2, threshold)
}

/// Whether the closed `curve` crosses itself.
///
/// `curve` must be the dense resampling, not a sparse outline: curves with
/// `4 * threshold` samples or fewer are always reported as intersecting.
///
/// # Example
/// ```
/// use bellshape::intersection::self_intersects;
/// use nalgebra::Point2;
///
/// let circle: Vec<Point2<f64>> = (0..2000)
///     .map(|k| {
///         let t = std::f64::consts::TAU * k as f64 / 2000.0;
///         Point2::new(100.0 * t.cos(), 100.0 * t.sin())
///     })
///     .collect();
/// assert!(!self_intersects(&circle, 100));
/// assert!(self_intersects(&circle[..300], 100));
/// ```
pub fn self_intersects(curve: &[Point2<f64>], threshold: usize) -> bool {
    if curve.len() <= 4 * threshold {
        return true;
    }
    // An arc of one point cannot be bisected further.
    let threshold = threshold.max(1);

    let arcs = presplit(curve, PRESPLIT_ORDER);
    arcs.iter().enumerate().any(|(i, a)| {
        arcs[i + 1..]
            .iter()
            .any(|b| arcs_intersect(a, b, threshold))
    })
}
