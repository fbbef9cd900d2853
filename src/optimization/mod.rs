//! Shape optimization toward a target chord.
//!
//! A [`Bell`] holds one candidate shape and runs Nelder-Mead or
//! basin-hopping searches on it; a [`BatchController`] drives many bells
//! for many targets on a worker pool.
//!
//! # Example
//!
//! ```
//! use bellshape::curve::Outline;
//! use bellshape::error::SolverError;
//! use bellshape::optimization::{Bell, MaterialParams, OptimizerSettings, Target};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! // Stand-in solver: modes fall as the plate grows.
//! let solver = |outline: &Outline, _: &MaterialParams, n: usize| -> Result<Vec<f64>, SolverError> {
//!     let base = 4.0e6 / outline.area();
//!     Ok((1..=n).map(|k| base * k as f64).collect())
//! };
//!
//! let mut settings = OptimizerSettings::default();
//! settings.max_iter = 20;
//!
//! let target = Target::new(vec![440.0, 660.0, 880.0]).unwrap();
//! let mut rng = StdRng::seed_from_u64(1);
//! let mut bell = Bell::random(target, MaterialParams::aluminum(), 150.0, 5, settings, &mut rng)
//!     .unwrap();
//!
//! let result = bell.optimize(&solver, &mut rng).unwrap();
//! println!("{}", result);
//! assert_eq!(bell.best_fit(), result.best_fit);
//! ```

pub mod basinhopping;
pub mod batch;
pub mod bell;
pub mod materials;
pub mod neldermead;
pub mod objective;
pub mod population;
pub mod types;

// Re-export commonly used items
pub use basinhopping::{BasinHoppingOptions, BasinHoppingResult, basin_hopping};
pub use batch::{
    BatchConfig, BatchController, BatchState, Buckets, CandidateParams, InitialShape,
    load_checkpoint,
};
pub use bell::Bell;
pub use materials::{gauge_thickness, get_material, sheet_material};
pub use neldermead::{NelderMeadOptions, NelderMeadResult, nelder_mead};
pub use objective::{
    compute_cents_error, compute_cents_errors, running_minimum, score, select_frequencies,
};
pub use population::{random_circular_points, random_circular_shape};
pub use types::{
    BasinHoppingSettings, Evaluation, MaterialParams, OptimizationResult, OptimizerSettings,
    RunSummary, SimulationReport, Target,
};
