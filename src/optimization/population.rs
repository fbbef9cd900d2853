//! Random initial shapes.

use std::f64::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::curve::CurveBuilder;
use crate::error::{CandidateError, MalformedInputError};
use crate::geometry::ControlPointSet;
use crate::types::MIN_CONTROL_POINTS;

/// Give up on random shapes after this many invalid draws.
pub const MAX_SHAPE_ATTEMPTS: usize = 1000;

/// Draw one roughly circular point set without checking it.
///
/// Angles are uniform on `[0, 2π)` and sorted; radii are uniform on
/// `[scale / 2, scale)`.
pub fn random_circular_points<R: Rng>(
    num_points: usize,
    scale: f64,
    rng: &mut R,
) -> Result<ControlPointSet, MalformedInputError> {
    if num_points < MIN_CONTROL_POINTS {
        return Err(MalformedInputError::TooFewPoints {
            min: MIN_CONTROL_POINTS,
            got: num_points,
        });
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(MalformedInputError::InvalidScale { value: scale });
    }

    let mut thetas: Vec<f64> = (0..num_points).map(|_| rng.r#gen::<f64>() * TAU).collect();
    thetas.sort_by(f64::total_cmp);

    let (xs, ys): (Vec<f64>, Vec<f64>) = thetas
        .iter()
        .map(|theta| {
            let r = rng.r#gen::<f64>() * scale / 2.0 + scale / 2.0;
            (r * theta.cos(), r * theta.sin())
        })
        .unzip();
    ControlPointSet::new(xs, ys)
}

/// Draw roughly circular point sets until one realizes into a valid shape.
pub fn random_circular_shape<R: Rng>(
    num_points: usize,
    scale: f64,
    builder: &CurveBuilder,
    rng: &mut R,
) -> Result<ControlPointSet, CandidateError> {
    for attempt in 1..=MAX_SHAPE_ATTEMPTS {
        let points = random_circular_points(num_points, scale, rng)?;
        if builder.is_valid(&points) {
            debug!(attempt, num_points, "generated random shape");
            return Ok(points);
        }
    }
    Err(CandidateError::NoValidShape {
        attempts: MAX_SHAPE_ATTEMPTS,
    })
}
