//! Periodic interpolating cubic spline through a closed ring of points.
//!
//! The ring is parameterized by normalized cumulative chord length on
//! `[0, 1]`. Second derivatives come from the cyclic tridiagonal system
//!
//! ```text
//! h[i-1] M[i-1] + 2 (h[i-1] + h[i]) M[i] + h[i] M[i+1]
//!     = 6 ((P[i+1] - P[i]) / h[i] - (P[i] - P[i-1]) / h[i-1])
//! ```
//!
//! with indices taken modulo the number of segments, which makes the curve
//! C2 continuous across the seam.

use nalgebra::{DMatrix, Point2, Vector2};

use crate::error::GeometryError;
use crate::geometry::ControlPointSet;

/// Chord length below which two consecutive points are treated as coincident.
const MIN_CHORD: f64 = 1e-12;

/// Closed cubic spline with zero smoothing.
#[derive(Debug, Clone)]
pub struct PeriodicSpline {
    /// Parameter value at each closed point, `knots[0] = 0`, `knots[n] = 1`.
    knots: Vec<f64>,
    /// Closed ring, first point repeated at the end.
    points: Vec<Point2<f64>>,
    /// Second derivative at each closed point.
    second: Vec<Vector2<f64>>,
}

impl PeriodicSpline {
    /// Fit the spline through `control` with a periodic boundary.
    ///
    /// # Errors
    /// [`GeometryError::Degenerate`] when two consecutive points coincide.
    pub fn fit(control: &ControlPointSet) -> Result<Self, GeometryError> {
        let points = control.closed_points();
        let n = points.len() - 1;

        let mut knots = Vec::with_capacity(n + 1);
        knots.push(0.0);
        let mut total = 0.0;
        for i in 0..n {
            let chord = (points[i + 1] - points[i]).norm();
            if chord <= MIN_CHORD {
                return Err(GeometryError::Degenerate {
                    index: i,
                    next: (i + 1) % n,
                });
            }
            total += chord;
            knots.push(total);
        }
        for t in &mut knots {
            *t /= total;
        }

        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();

        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DMatrix::<f64>::zeros(n, 2);
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            a[(i, prev)] += h[prev];
            a[(i, i)] += 2.0 * (h[prev] + h[i]);
            a[(i, next)] += h[i];

            let forward = (points[i + 1] - points[i]) / h[i];
            let backward = (points[i] - points[prev]) / h[prev];
            let diff = (forward - backward) * 6.0;
            rhs[(i, 0)] = diff.x;
            rhs[(i, 1)] = diff.y;
        }

        // Strictly diagonally dominant for positive chords, so LU always succeeds.
        let solution = a.lu().solve(&rhs).ok_or(GeometryError::Degenerate {
            index: 0,
            next: 1 % n,
        })?;

        let mut second: Vec<Vector2<f64>> = (0..n)
            .map(|i| Vector2::new(solution[(i, 0)], solution[(i, 1)]))
            .collect();
        second.push(second[0]);

        Ok(Self {
            knots,
            points,
            second,
        })
    }

    /// Point on the curve at parameter `t`, wrapped into `[0, 1]`.
    pub fn eval(&self, t: f64) -> Point2<f64> {
        let t = if (0.0..=1.0).contains(&t) {
            t
        } else {
            t.rem_euclid(1.0)
        };
        let last = self.knots.len() - 2;
        let i = self
            .knots
            .partition_point(|&k| k <= t)
            .saturating_sub(1)
            .min(last);

        let (t0, t1) = (self.knots[i], self.knots[i + 1]);
        let h = t1 - t0;
        let (a, b) = (t1 - t, t - t0);
        let (m0, m1) = (self.second[i], self.second[i + 1]);
        let (p0, p1) = (self.points[i].coords, self.points[i + 1].coords);

        let coords = m0 * (a * a * a / (6.0 * h))
            + m1 * (b * b * b / (6.0 * h))
            + (p0 / h - m0 * (h / 6.0)) * a
            + (p1 / h - m1 * (h / 6.0)) * b;
        Point2::from(coords)
    }

    /// `n` samples uniform in parameter, `t = 1/n, 2/n, ..., 1`.
    ///
    /// The sample at `t = 0` is skipped because it duplicates `t = 1`.
    pub fn sample(&self, n: usize) -> Vec<Point2<f64>> {
        (1..=n).map(|k| self.eval(k as f64 / n as f64)).collect()
    }
}
