//! Curve builder: control points to a dense closed curve and a sparse outline.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geometry::ControlPointSet;
use crate::intersection::self_intersects;
use crate::spline::PeriodicSpline;
use crate::types::{DEFAULT_INTERSECTION_THRESHOLD, DEFAULT_RESOLUTION};

/// Dense resampling of a closed spline, used for geometric checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub points: Vec<Point2<f64>>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Sparse polyline sent to the eigensolver and to drawing export.
///
/// The closing segment from the last point back to the first is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub points: Vec<Point2<f64>>,
}

impl Outline {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Enclosed area by the shoelace formula, always non-negative.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let (p, q) = (self.points[i], self.points[(i + 1) % n]);
                p.x * q.y - q.x * p.y
            })
            .sum();
        twice.abs() / 2.0
    }
}

/// A realized, non-intersecting shape.
#[derive(Debug, Clone)]
pub struct Shape {
    pub curve: Curve,
    pub outline: Outline,
}

/// Resolution and intersection threshold used to realize shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveBuilder {
    /// Samples along the closed spline.
    pub resolution: usize,
    /// Arc length at which the intersection test stops subdividing.
    pub intersection_threshold: usize,
}

impl Default for CurveBuilder {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            intersection_threshold: DEFAULT_INTERSECTION_THRESHOLD,
        }
    }
}

impl CurveBuilder {
    pub fn new(resolution: usize, intersection_threshold: usize) -> Self {
        Self {
            resolution,
            intersection_threshold,
        }
    }

    /// Fit the periodic spline and resample it, without any validity check.
    pub fn interpolate(&self, points: &ControlPointSet) -> Result<Curve, GeometryError> {
        let spline = PeriodicSpline::fit(points)?;
        Ok(Curve {
            points: spline.sample(self.resolution),
        })
    }

    /// Whether `points` realize into a usable shape.
    pub fn is_valid(&self, points: &ControlPointSet) -> bool {
        match self.interpolate(points) {
            Ok(curve) => !self_intersects(&curve.points, self.intersection_threshold),
            Err(_) => false,
        }
    }

    /// Realize `points` into a dense curve and an outline of at most
    /// `max_output_len` points.
    ///
    /// # Errors
    /// [`GeometryError::SelfIntersecting`] for crossing shapes, and
    /// [`GeometryError::Degenerate`] when consecutive points coincide.
    /// Both are routine during optimization.
    pub fn realize(
        &self,
        points: &ControlPointSet,
        max_output_len: usize,
    ) -> Result<Shape, GeometryError> {
        let curve = self.interpolate(points)?;
        if self_intersects(&curve.points, self.intersection_threshold) {
            return Err(GeometryError::SelfIntersecting);
        }
        let outline = downsample(&curve, max_output_len);
        Ok(Shape { curve, outline })
    }
}

/// Every k-th point of `curve`, `k = len / max_output_len + 1`.
pub fn downsample(curve: &Curve, max_output_len: usize) -> Outline {
    let stride = curve.len() / max_output_len.max(1) + 1;
    Outline {
        points: curve.points.iter().step_by(stride).copied().collect(),
    }
}
