//! Control points describing a closed bell outline.
//!
//! A shape is an ordered ring of (x, y) points. Closure is implicit: the
//! first point is never repeated at the end. Optimizers work on the
//! flattened form, all x coordinates followed by all y coordinates.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::MalformedInputError;
use crate::types::MIN_CONTROL_POINTS;

/// Ordered control points of a closed shape.
///
/// Every value is validated on construction, including deserialization,
/// so holders never need to re-check lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoints", into = "RawPoints")]
pub struct ControlPointSet {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawPoints {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl TryFrom<RawPoints> for ControlPointSet {
    type Error = MalformedInputError;

    fn try_from(raw: RawPoints) -> Result<Self, Self::Error> {
        ControlPointSet::new(raw.xs, raw.ys)
    }
}

impl From<ControlPointSet> for RawPoints {
    fn from(points: ControlPointSet) -> Self {
        RawPoints {
            xs: points.xs,
            ys: points.ys,
        }
    }
}

impl ControlPointSet {
    /// Build a point set from separate coordinate arrays.
    ///
    /// # Errors
    /// Fails when the arrays differ in length, hold fewer than three points,
    /// or contain a non-finite coordinate.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, MalformedInputError> {
        if xs.len() != ys.len() {
            return Err(MalformedInputError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        if xs.len() < MIN_CONTROL_POINTS {
            return Err(MalformedInputError::TooFewPoints {
                min: MIN_CONTROL_POINTS,
                got: xs.len(),
            });
        }
        if let Some(index) = xs
            .iter()
            .zip(&ys)
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(MalformedInputError::NonFiniteCoordinate { index });
        }
        Ok(Self { xs, ys })
    }

    /// Build a point set from `(x, y)` pairs.
    pub fn from_points(points: &[Point2<f64>]) -> Result<Self, MalformedInputError> {
        let xs = points.iter().map(|p| p.x).collect();
        let ys = points.iter().map(|p| p.y).collect();
        Self::new(xs, ys)
    }

    /// Split a flattened `[x.., y..]` vector back into a point set.
    ///
    /// # Example
    /// ```
    /// use bellshape::geometry::ControlPointSet;
    ///
    /// let points = ControlPointSet::from_flat(&[0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
    /// assert_eq!(points.len(), 3);
    /// assert_eq!(points.ys(), &[0.0, 0.0, 1.0]);
    /// ```
    pub fn from_flat(flat: &[f64]) -> Result<Self, MalformedInputError> {
        let (xs, ys) = unflatten(flat)?;
        Self::new(xs, ys)
    }

    /// Concatenate all x coordinates followed by all y coordinates.
    pub fn flatten(&self) -> Vec<f64> {
        flatten(&self.xs, &self.ys)
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Number of control points.
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Always false for a constructed set; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Points as `nalgebra` points, in order.
    pub fn points(&self) -> Vec<Point2<f64>> {
        self.xs
            .iter()
            .zip(&self.ys)
            .map(|(&x, &y)| Point2::new(x, y))
            .collect()
    }

    /// The ring with the first point repeated at the end.
    pub fn closed_points(&self) -> Vec<Point2<f64>> {
        let mut points = self.points();
        points.push(points[0]);
        points
    }
}

/// Concatenate `xs` then `ys` into a single optimizer vector.
pub fn flatten(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let mut flat = Vec::with_capacity(xs.len() + ys.len());
    flat.extend_from_slice(xs);
    flat.extend_from_slice(ys);
    flat
}

/// Split an optimizer vector into its x and y halves.
///
/// # Errors
/// Returns [`MalformedInputError::OddLength`] when the halves cannot match.
pub fn unflatten(flat: &[f64]) -> Result<(Vec<f64>, Vec<f64>), MalformedInputError> {
    if flat.len() % 2 != 0 {
        return Err(MalformedInputError::OddLength { len: flat.len() });
    }
    let (xs, ys) = flat.split_at(flat.len() / 2);
    Ok((xs.to_vec(), ys.to_vec()))
}
