//! Type definitions for bell optimization.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::curve::CurveBuilder;
use crate::error::MalformedInputError;
use crate::geometry::ControlPointSet;
use crate::types::{
    DEFAULT_CROSSPENALTY, DEFAULT_FREQUENCY_TOLERANCE, DEFAULT_NUM_MODES, Grade, MAX_SIMPLEX_ITER,
    Method,
};

use super::objective::compute_cents_errors;

/// Desired eigenfrequencies (Hz), in the order they are compared.
///
/// Immutable once built. Equality, ordering and hashing use the exact bit
/// patterns of the frequencies so a target can key a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Target(Vec<f64>);

impl Target {
    /// # Errors
    /// Fails on an empty list or a frequency that is not positive and finite.
    pub fn new(frequencies: Vec<f64>) -> Result<Self, MalformedInputError> {
        if frequencies.is_empty() {
            return Err(MalformedInputError::EmptyTarget);
        }
        if let Some((index, &value)) = frequencies
            .iter()
            .enumerate()
            .find(|(_, f)| !f.is_finite() || **f <= 0.0)
        {
            return Err(MalformedInputError::InvalidTargetFrequency { index, value });
        }
        Ok(Self(frequencies))
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The same chord shifted by `semitones` in equal temperament.
    ///
    /// # Example
    /// ```
    /// use bellshape::optimization::Target;
    ///
    /// let a = Target::new(vec![440.0, 660.0]).unwrap();
    /// let up = a.transposed(12);
    /// assert!((up.frequencies()[0] - 880.0).abs() < 1e-9);
    /// ```
    pub fn transposed(&self, semitones: i32) -> Self {
        let ratio = 2f64.powf(semitones as f64 / 12.0);
        Self(self.0.iter().map(|f| f * ratio).collect())
    }
}

impl TryFrom<Vec<f64>> for Target {
    type Error = MalformedInputError;

    fn try_from(frequencies: Vec<f64>) -> Result<Self, Self::Error> {
        Target::new(frequencies)
    }
}

impl From<Target> for Vec<f64> {
    fn from(target: Target) -> Self {
        target.0
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Target {}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match a.total_cmp(b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for f in &self.0 {
            f.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, freq) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.2}", freq)?;
        }
        write!(f, "]")
    }
}

/// Plate material and thickness, in the units the eigensolver expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialParams {
    pub name: String,
    /// Elastic modulus
    pub e: f64,
    /// Poisson's ratio
    pub nu: f64,
    /// Density
    pub rho: f64,
    /// Plate thickness (mm)
    pub thickness: f64,
}

impl MaterialParams {
    pub fn new(name: impl Into<String>, e: f64, nu: f64, rho: f64, thickness: f64) -> Self {
        Self {
            name: name.into(),
            e,
            nu,
            rho,
            thickness,
        }
    }

    /// Same material at a different thickness.
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    /// Aluminum 6061 plate, 1/4" thick.
    pub fn aluminum() -> Self {
        Self::new("Aluminum 6061", 69000e6, 0.33, 0.002712, 6.35)
    }

    /// Galvanized steel sheet, 10 gauge.
    pub fn galvanized_steel() -> Self {
        Self::new("Galvanized Steel", 200000e6, 0.3, 0.007850, 3.51)
    }
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self::aluminum()
    }
}

/// Basin-hopping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasinHoppingSettings {
    /// Number of hops after the initial local minimization.
    pub niter: usize,
    /// Maximum displacement per coordinate of a hop.
    pub step_size: f64,
    /// Metropolis temperature.
    pub temperature: f64,
    /// Local simplex tolerance is the grade tolerance times this factor.
    pub local_tol_factor: f64,
    /// Hops between step-size adjustments, 0 disables adjustment.
    pub interval: usize,
    /// Acceptance rate the step size is steered toward.
    pub target_accept_rate: f64,
    /// Multiplicative step-size adjustment.
    pub step_factor: f64,
}

impl Default for BasinHoppingSettings {
    fn default() -> Self {
        Self {
            niter: 100,
            step_size: 20.0,
            temperature: 1.0,
            local_tol_factor: 100.0,
            interval: 50,
            target_accept_rate: 0.5,
            step_factor: 0.9,
        }
    }
}

/// Tunables shared by every evaluation and optimization run of a bell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Base penalty for invalid shapes; actual penalty is in `[p, 2p)`.
    pub crosspenalty: f64,
    /// Curve sampling and intersection threshold.
    pub curve: CurveBuilder,
    /// Elastic modes requested from the solver.
    pub num_modes: usize,
    /// Slack (Hz) around the target window when selecting modes.
    pub frequency_tolerance: f64,
    /// Simplex iteration cap.
    pub max_iter: usize,
    /// Optional cap on objective evaluations per simplex run.
    pub max_fun: Option<usize>,
    pub basin_hopping: BasinHoppingSettings,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            crosspenalty: DEFAULT_CROSSPENALTY,
            curve: CurveBuilder::default(),
            num_modes: DEFAULT_NUM_MODES,
            frequency_tolerance: DEFAULT_FREQUENCY_TOLERANCE,
            max_iter: MAX_SIMPLEX_ITER,
            max_fun: None,
            basin_hopping: BasinHoppingSettings::default(),
        }
    }
}

/// One successful fitness evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub fitness: f64,
    /// Every non-trivial frequency the solver returned.
    pub frequencies: Vec<f64>,
    /// The subset compared against the target.
    pub matched: Vec<f64>,
}

/// Summary of one completed optimize call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub method: Method,
    pub grade: Grade,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    /// Lowest fitness seen during this run, if any evaluation succeeded.
    pub best_fit: Option<f64>,
}

/// Outcome of an optimize call.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub method: Method,
    pub grade: Grade,
    /// Terminal point set of the optimizer.
    pub optpts: ControlPointSet,
    /// Fitness at the terminal point set.
    pub terminal_fit: f64,
    /// Lowest fitness across the whole history.
    pub best_fit: Option<f64>,
    /// Matched frequencies of the best evaluation.
    pub best_fq: Option<Vec<f64>>,
    pub target: Vec<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

impl OptimizationResult {
    /// Cents deviation of each best frequency from its target.
    pub fn errors_in_cents(&self) -> Vec<f64> {
        match &self.best_fq {
            Some(fq) => compute_cents_errors(fq, &self.target),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result ({:?}, {:?}):", self.method, self.grade)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Evaluations: {}", self.evaluations)?;
        writeln!(f, "  Converged: {}", self.converged)?;
        writeln!(f, "  Terminal fitness: {:.4}", self.terminal_fit)?;
        match self.best_fit {
            Some(fit) => writeln!(f, "  Best fitness: {:.4}", fit)?,
            None => writeln!(f, "  Best fitness: none (no valid shape found)")?,
        }
        if let Some(fq) = &self.best_fq {
            writeln!(f, "  Frequencies (Hz):")?;
            let cents = self.errors_in_cents();
            for (i, (comp, target)) in fq.iter().zip(&self.target).enumerate() {
                writeln!(
                    f,
                    "    f{}: {:.1} Hz (target: {:.1} Hz, error: {:.1} cents)",
                    i + 1,
                    comp,
                    target,
                    cents.get(i).copied().unwrap_or(0.0)
                )?;
            }
        }
        writeln!(f, "  Control points:")?;
        for (x, y) in self.optpts.xs().iter().zip(self.optpts.ys()) {
            writeln!(f, "    ({:.3}, {:.3})", x, y)?;
        }
        Ok(())
    }
}

/// Result of evaluating a bell's current shape once.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub fitness: f64,
    /// Solver frequencies and the matched subset, absent when the shape
    /// was penalized.
    pub evaluation: Option<Evaluation>,
}
