//! Error types.
//!
//! Geometry and per-evaluation solver failures are recoverable: a candidate
//! turns them into a penalty score. Malformed input, missing solver
//! executables, and batch-level failures propagate to the caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::optimization::types::Target;

/// Caller supplied point arrays or targets that cannot describe a bell.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedInputError {
    /// Flattened coordinates must split into equal x and y halves.
    #[error("flattened point array has odd length {len}")]
    OddLength {
        /// Length of the offending array
        len: usize,
    },

    /// x and y arrays differ in length.
    #[error("x has {xs} coordinates but y has {ys}")]
    LengthMismatch {
        /// Number of x coordinates
        xs: usize,
        /// Number of y coordinates
        ys: usize,
    },

    /// Not enough points to enclose an area.
    #[error("need at least {min} control points, got {got}")]
    TooFewPoints {
        /// Minimum number of points
        min: usize,
        /// Number of points provided
        got: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("control point {index} is not finite")]
    NonFiniteCoordinate {
        /// Index of the point
        index: usize,
    },

    /// Target has no frequencies.
    #[error("target frequency list is empty")]
    EmptyTarget,

    /// Shape scale must be positive and finite.
    #[error("shape scale {value} is not a positive finite number")]
    InvalidScale {
        /// Offending value
        value: f64,
    },

    /// Target frequencies must be positive and finite.
    #[error("target frequency {value} at index {index} is not a positive finite number")]
    InvalidTargetFrequency {
        /// Index of the frequency
        index: usize,
        /// Offending value
        value: f64,
    },
}

/// A realized shape is unusable for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The dense curve crosses itself.
    #[error("shape is self-intersecting")]
    SelfIntersecting,

    /// Consecutive control points coincide, so the spline is undefined.
    #[error("control points {index} and {next} coincide")]
    Degenerate {
        /// Index of the first point
        index: usize,
        /// Index of the coincident point
        next: usize,
    },
}

/// The external eigensolver did not produce usable frequencies.
#[derive(Debug, Error)]
pub enum SolverError {
    /// An executable is not on the search path.
    #[error("solver executable not found: {0}")]
    ExecutableNotFound(String),

    /// Spawning a solver process failed for a reason other than absence.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Solver process exited unsuccessfully.
    #[error("{program} exited with status {status}")]
    NonZeroExit {
        /// Program name
        program: String,
        /// Exit status, or -1 when killed by a signal
        status: i32,
    },

    /// Solver process ran longer than allowed and was killed.
    #[error("{program} timed out after {seconds} s")]
    Timeout {
        /// Program name
        program: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// Expected output file was never written.
    #[error("solver output missing: {}", .0.display())]
    MissingOutput(PathBuf),

    /// Output file exists but holds no eigenvalue table.
    #[error("malformed solver output: {0}")]
    MalformedOutput(String),

    /// Not enough modes to compare against the target.
    #[error("solver returned {got} usable modes, need {needed}")]
    TooFewModes {
        /// Modes available after selection
        got: usize,
        /// Modes required
        needed: usize,
    },

    /// Filesystem error while preparing or cleaning the working directory.
    #[error("solver I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SolverError {
    /// Returns `true` when the failure comes from the environment, not the shape.
    ///
    /// These failures would repeat for every shape, so they are not
    /// worth penalizing one evaluation at a time.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            SolverError::ExecutableNotFound(_) | SolverError::Spawn { .. }
        )
    }
}

/// Why one evaluation produced a penalty instead of a fitness.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Errors surfaced by a single candidate.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// Point set or target cannot be used.
    #[error(transparent)]
    Malformed(#[from] MalformedInputError),

    /// The eigensolver is not usable at all.
    #[error("eigensolver unavailable: {0}")]
    SolverUnavailable(#[source] SolverError),

    /// Refinement requested before any optimization run completed.
    #[error("candidate has not been optimized yet")]
    NotOptimized,

    /// Random shape generation kept producing invalid shapes.
    #[error("no valid random shape after {attempts} attempts")]
    NoValidShape {
        /// Shapes tried
        attempts: usize,
    },
}

/// Errors surfaced by the batch controller.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Nothing in the roughed bucket to refine.
    #[error("no roughed candidates to refine")]
    NoCandidates,

    /// A worker task panicked.
    #[error("worker for target {target} panicked: {message}")]
    WorkerPanicked {
        /// Target the worker was optimizing
        target: Target,
        /// Panic payload, when it was a string
        message: String,
    },

    /// A candidate failed in a way that is not a penalty.
    #[error("candidate for target {target} failed: {source}")]
    Candidate {
        /// Target the candidate belongs to
        target: Target,
        /// Underlying failure
        #[source]
        source: CandidateError,
    },

    /// Reading or writing the checkpoint failed.
    #[error("checkpoint {}: {source}", .path.display())]
    Checkpoint {
        /// Checkpoint path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Resume requested without a checkpoint path.
    #[error("no checkpoint path configured")]
    NoCheckpointPath,

    /// Checkpoint contents could not be encoded or decoded.
    #[error("checkpoint encoding: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl BatchError {
    /// Returns `true` if a worker died or a candidate failed.
    pub fn is_worker_error(&self) -> bool {
        matches!(
            self,
            BatchError::WorkerPanicked { .. } | BatchError::Candidate { .. }
        )
    }
}

/// Configuration file problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_messages_name_the_problem() {
        let err = MalformedInputError::OddLength { len: 7 };
        assert_eq!(err.to_string(), "flattened point array has odd length 7");
        let err = MalformedInputError::TooFewPoints { min: 3, got: 2 };
        assert!(err.to_string().contains("at least 3"));
    }

    #[test]
    fn missing_executable_is_infrastructure() {
        assert!(SolverError::ExecutableNotFound("ccx".into()).is_infrastructure());
        assert!(!SolverError::MalformedOutput("empty".into()).is_infrastructure());
        assert!(!SolverError::TooFewModes { got: 2, needed: 4 }.is_infrastructure());
    }

    #[test]
    fn candidate_error_wraps_malformed_input() {
        let err: CandidateError = MalformedInputError::EmptyTarget.into();
        assert!(matches!(err, CandidateError::Malformed(_)));
        assert_eq!(err.to_string(), "target frequency list is empty");
    }

    #[test]
    fn worker_errors_are_classified() {
        assert!(!BatchError::NoCandidates.is_worker_error());
        let err = BatchError::ThreadPool("no threads".into());
        assert!(!err.is_worker_error());
    }
}
