//! Plate-bell shape search.
//!
//! Finds closed 2-D plate outlines whose vibration modes land on a target
//! chord. A handful of control points is interpolated into a periodic
//! spline, checked for self-intersection, handed to a finite-element
//! eigensolver, and scored against the target; derivative-free optimizers
//! then move the control points.
//!
//! - [`curve`], [`spline`], [`intersection`]: control points to a valid
//!   outline.
//! - [`eigensolver`]: the [`Eigensolver`] contract and the CalculiX adapter.
//! - [`optimization`]: fitness, Nelder-Mead, basin-hopping, the [`Bell`]
//!   candidate and the [`BatchController`].
//! - [`config`], [`export`]: TOML settings and DXF output.
//!
//! # Example
//!
//! ```
//! use bellshape::{ControlPointSet, CurveBuilder, Grade};
//!
//! let points = ControlPointSet::new(
//!     vec![100.0, 0.0, -100.0, 0.0],
//!     vec![0.0, 80.0, 0.0, -80.0],
//! )
//! .unwrap();
//!
//! let shape = CurveBuilder::default()
//!     .realize(&points, Grade::Coarse.max_output_len())
//!     .unwrap();
//! assert_eq!(shape.curve.len(), 2000);
//! assert!(shape.outline.len() <= 50);
//! ```

pub mod config;
pub mod curve;
pub mod eigensolver;
pub mod error;
pub mod export;
pub mod geometry;
pub mod intersection;
pub mod optimization;
pub mod spline;
pub mod types;

pub use config::AppConfig;
pub use curve::{Curve, CurveBuilder, Outline, Shape};
pub use eigensolver::{CalculixSolver, Eigensolver, SolverConfig};
pub use error::{
    BatchError, CandidateError, ConfigError, EvaluationError, GeometryError, MalformedInputError,
    SolverError,
};
pub use geometry::ControlPointSet;
pub use intersection::self_intersects;
pub use optimization::{
    BatchConfig, BatchController, Bell, CandidateParams, InitialShape, MaterialParams,
    OptimizationResult, OptimizerSettings, Target,
};
pub use types::{Grade, Method};
