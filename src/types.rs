//! Constants and core enums shared across the crate.

use serde::{Deserialize, Serialize};

// Curve sampling
/// Number of samples taken along the closed spline for geometric analysis.
pub const DEFAULT_RESOLUTION: usize = 2000;

/// Arc length (in samples) below which two overlapping arcs are assumed to cross.
pub const DEFAULT_INTERSECTION_THRESHOLD: usize = 100;

/// Number of bisection rounds applied before pairwise arc testing (2^3 = 8 arcs).
pub const PRESPLIT_ORDER: u32 = 3;

/// Minimum number of control points describing a closed shape.
pub const MIN_CONTROL_POINTS: usize = 3;

// Outline caps sent to the eigensolver
/// Outline length cap for coarse evaluations.
pub const COARSE_OUTLINE_LEN: usize = 50;

/// Outline length cap for fine evaluations.
pub const FINE_OUTLINE_LEN: usize = 100;

// Optimization
/// Base value of the penalty returned for invalid shapes.
///
/// Chosen to be far above any fitness a real shape produces.
pub const DEFAULT_CROSSPENALTY: f64 = 100_000.0;

/// Simplex tolerance (xtol and ftol) at coarse grade.
pub const COARSE_TOLERANCE: f64 = 1.0;

/// Simplex tolerance (xtol and ftol) at fine grade.
pub const FINE_TOLERANCE: f64 = 0.1;

/// Maximum simplex iterations per optimize call.
pub const MAX_SIMPLEX_ITER: usize = 300;

/// Half-width (Hz) of the slack added around the target when selecting modes.
pub const DEFAULT_FREQUENCY_TOLERANCE: f64 = 10.0;

/// Number of elastic modes requested from the solver per evaluation.
pub const DEFAULT_NUM_MODES: usize = 36;

/// Rigid-body modes a free plate always has; the solver drops this many.
pub const RIGID_BODY_MODES: usize = 6;

/// Control points of a random starting shape.
pub const DEFAULT_CONTROL_POINTS: usize = 5;

/// Outer radius (mm) of a random starting shape.
pub const DEFAULT_SHAPE_SCALE: f64 = 150.0;

/// Mesh and convergence fidelity of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    /// Sparse outline, loose tolerances. Used for the first search.
    #[default]
    Coarse,
    /// Denser outline, tight tolerances. Reached once via refinement.
    Fine,
}

impl Grade {
    /// Outline length cap for this grade.
    pub fn max_output_len(self) -> usize {
        match self {
            Grade::Coarse => COARSE_OUTLINE_LEN,
            Grade::Fine => FINE_OUTLINE_LEN,
        }
    }

    /// Simplex xtol/ftol for this grade.
    pub fn tolerance(self) -> f64 {
        match self {
            Grade::Coarse => COARSE_TOLERANCE,
            Grade::Fine => FINE_TOLERANCE,
        }
    }
}

/// Optimization strategy driving a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Nelder-Mead downhill simplex.
    #[default]
    Simplex,
    /// Random hops with a local simplex minimization after each.
    BasinHopping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_caps_and_tolerances() {
        assert_eq!(Grade::Coarse.max_output_len(), 50);
        assert_eq!(Grade::Fine.max_output_len(), 100);
        assert!(Grade::Fine.tolerance() < Grade::Coarse.tolerance());
    }

    #[test]
    fn enums_serialize_snake_case() {
        let json = serde_json::to_string(&Method::BasinHopping).unwrap();
        assert_eq!(json, "\"basin_hopping\"");
        let grade: Grade = serde_json::from_str("\"fine\"").unwrap();
        assert_eq!(grade, Grade::Fine);
    }
}
