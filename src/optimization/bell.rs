//! A single bell candidate and its optimization runs.
//!
//! A [`Bell`] owns its starting shape, target, material, and the full
//! history of successful evaluations. Invalid shapes and solver failures
//! never escape [`Bell::evaluate`]: they score a randomized penalty in
//! `[crosspenalty, 2 * crosspenalty)` so the simplex never sees a flat
//! plateau of identical failures.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::eigensolver::Eigensolver;
use crate::error::{CandidateError, EvaluationError, MalformedInputError, SolverError};
use crate::geometry::ControlPointSet;
use crate::types::{Grade, Method};

use super::basinhopping::{BasinHoppingOptions, basin_hopping};
use super::neldermead::{NelderMeadOptions, nelder_mead};
use super::objective::{running_minimum, score, select_frequencies};
use super::population::random_circular_shape;
use super::types::{
    Evaluation, MaterialParams, OptimizationResult, OptimizerSettings, RunSummary,
    SimulationReport, Target,
};

/// Serialization format revision of [`Bell`].
pub const BELL_FORMAT_VERSION: u32 = 1;

/// Everything an evaluation reads, borrowed apart from the history.
struct Scorer<'a, S: ?Sized> {
    target: &'a Target,
    material: &'a MaterialParams,
    settings: &'a OptimizerSettings,
    grade: Grade,
    solver: &'a S,
}

impl<S: Eigensolver + ?Sized> Scorer<'_, S> {
    fn measure(&self, points: &ControlPointSet) -> Result<Evaluation, EvaluationError> {
        let shape = self
            .settings
            .curve
            .realize(points, self.grade.max_output_len())?;
        let solved = self
            .solver
            .solve(&shape.outline, self.material, self.settings.num_modes)?;
        let matched = select_frequencies(
            &solved,
            self.target.frequencies(),
            self.settings.frequency_tolerance,
        )
        .ok_or(SolverError::TooFewModes {
            got: solved.len(),
            needed: self.target.len(),
        })?;
        let fitness = score(self.target.frequencies(), &matched);
        Ok(Evaluation {
            fitness,
            frequencies: solved,
            matched,
        })
    }

    fn penalty<R: Rng>(&self, rng: &mut R) -> f64 {
        self.settings.crosspenalty * (rng.r#gen::<f64>() + 1.0)
    }

    /// Fitness of `flat`, appending successful evaluations to `history`.
    fn evaluate<R: Rng>(
        &self,
        flat: &[f64],
        history: &mut Vec<Evaluation>,
        rng: &mut R,
    ) -> Result<f64, MalformedInputError> {
        let points = ControlPointSet::from_flat(flat)?;
        match self.measure(&points) {
            Ok(evaluation) => {
                let fitness = evaluation.fitness;
                debug!(fitness, "evaluated shape");
                history.push(evaluation);
                Ok(fitness)
            }
            Err(EvaluationError::Solver(e)) if e.is_infrastructure() => {
                let penalty = self.penalty(rng);
                warn!(error = %e, penalty, "solver unavailable during evaluation");
                Ok(penalty)
            }
            Err(e) => {
                let penalty = self.penalty(rng);
                debug!(reason = %e, penalty, "penalized shape");
                Ok(penalty)
            }
        }
    }

    /// Objective for the optimizers: never fails.
    fn objective<R: Rng>(&self, flat: &[f64], history: &mut Vec<Evaluation>, rng: &mut R) -> f64 {
        self.evaluate(flat, history, rng).unwrap_or_else(|e| {
            warn!(error = %e, "optimizer proposed unusable coordinates");
            self.penalty(rng)
        })
    }
}

/// Terminal state of one optimizer run, independent of method.
struct RunOutcome {
    x: Vec<f64>,
    fun: f64,
    iterations: usize,
    evaluations: usize,
    converged: bool,
    all_vecs: Vec<Vec<f64>>,
}

/// One optimization candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bell {
    version: u32,
    name: String,
    target: Target,
    material: MaterialParams,
    grade: Grade,
    method: Method,
    settings: OptimizerSettings,
    /// Starting shape of the optimizer.
    c0: ControlPointSet,
    /// Terminal shape of the most recent run.
    optpts: Option<ControlPointSet>,
    /// Best simplex vertex per iteration, across runs.
    all_vecs: Vec<Vec<f64>>,
    /// Successful evaluations in call order.
    history: Vec<Evaluation>,
    runs: Vec<RunSummary>,
    best_fit: Option<f64>,
    best_fq: Option<Vec<f64>>,
}

impl Bell {
    pub fn new(target: Target, material: MaterialParams, c0: ControlPointSet) -> Self {
        Self {
            version: BELL_FORMAT_VERSION,
            name: String::from("bell"),
            target,
            material,
            grade: Grade::default(),
            method: Method::default(),
            settings: OptimizerSettings::default(),
            c0,
            optpts: None,
            all_vecs: Vec::new(),
            history: Vec::new(),
            runs: Vec::new(),
            best_fit: None,
            best_fq: None,
        }
    }

    /// Bell with a random, roughly circular starting shape of radius up to `scale`.
    pub fn random<R: Rng>(
        target: Target,
        material: MaterialParams,
        scale: f64,
        num_points: usize,
        settings: OptimizerSettings,
        rng: &mut R,
    ) -> Result<Self, CandidateError> {
        let c0 = random_circular_shape(num_points, scale, &settings.curve, rng)?;
        Ok(Self::new(target, material, c0).with_settings(settings))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = grade;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_settings(mut self, settings: OptimizerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn material(&self) -> &MaterialParams {
        &self.material
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    pub fn c0(&self) -> &ControlPointSet {
        &self.c0
    }

    pub fn optpts(&self) -> Option<&ControlPointSet> {
        self.optpts.as_ref()
    }

    pub fn all_vecs(&self) -> &[Vec<f64>] {
        &self.all_vecs
    }

    pub fn history(&self) -> &[Evaluation] {
        &self.history
    }

    pub fn runs(&self) -> &[RunSummary] {
        &self.runs
    }

    /// Lowest fitness in the history.
    pub fn best_fit(&self) -> Option<f64> {
        self.best_fit
    }

    /// Matched frequencies of the lowest-fitness evaluation.
    pub fn best_fq(&self) -> Option<&[f64]> {
        self.best_fq.as_deref()
    }

    /// Lowest fitness seen up to each point of the history.
    pub fn best_so_far(&self) -> Vec<f64> {
        running_minimum(self.history.iter().map(|e| e.fitness))
    }

    fn update_best(&mut self) {
        let best = self
            .history
            .iter()
            .reduce(|best, e| if e.fitness < best.fitness { e } else { best });
        if let Some(best) = best {
            self.best_fit = Some(best.fitness);
            self.best_fq = Some(best.matched.clone());
        }
    }

    /// Score a flattened point set and record it in the history.
    ///
    /// Self-intersecting shapes and solver failures return the randomized
    /// penalty and leave the history untouched.
    ///
    /// # Errors
    /// [`MalformedInputError`] when `flat` does not describe a point set.
    pub fn evaluate<S, R>(
        &mut self,
        flat: &[f64],
        solver: &S,
        rng: &mut R,
    ) -> Result<f64, MalformedInputError>
    where
        S: Eigensolver + ?Sized,
        R: Rng,
    {
        let Bell {
            target,
            material,
            settings,
            grade,
            history,
            ..
        } = self;
        let scorer = Scorer {
            target,
            material,
            settings,
            grade: *grade,
            solver,
        };
        let fitness = scorer.evaluate(flat, history, rng)?;
        self.update_best();
        Ok(fitness)
    }

    /// Evaluate the starting shape once.
    pub fn simulate<S, R>(
        &mut self,
        solver: &S,
        rng: &mut R,
    ) -> Result<SimulationReport, CandidateError>
    where
        S: Eigensolver + ?Sized,
        R: Rng,
    {
        solver.check().map_err(CandidateError::SolverUnavailable)?;
        let before = self.history.len();
        let flat = self.c0.flatten();
        let fitness = self.evaluate(&flat, solver, rng)?;
        Ok(SimulationReport {
            fitness,
            evaluation: self.history.get(before).cloned(),
        })
    }

    /// Run the configured optimizer from `c0`.
    ///
    /// `optpts` becomes the optimizer's terminal shape, while `best_fit` and
    /// `best_fq` come from the lowest fitness anywhere in the history.
    ///
    /// # Errors
    /// Fails before any evaluation when the solver is unusable.
    pub fn optimize<S, R>(
        &mut self,
        solver: &S,
        rng: &mut R,
    ) -> Result<OptimizationResult, CandidateError>
    where
        S: Eigensolver + ?Sized,
        R: Rng,
    {
        solver.check().map_err(CandidateError::SolverUnavailable)?;

        let x0 = self.c0.flatten();
        let tolerance = self.grade.tolerance();
        let history_start = self.history.len();
        let mut penalty_rng = StdRng::seed_from_u64(rng.r#gen());

        info!(
            name = %self.name,
            method = ?self.method,
            grade = ?self.grade,
            target = %self.target,
            "optimizing bell"
        );

        let outcome = {
            let Bell {
                target,
                material,
                settings,
                grade,
                method,
                history,
                ..
            } = &mut *self;
            let settings: &OptimizerSettings = settings;
            let scorer = Scorer {
                target,
                material,
                settings,
                grade: *grade,
                solver,
            };
            let objective = |x: &[f64]| scorer.objective(x, history, &mut penalty_rng);

            match method {
                Method::Simplex => {
                    let options = NelderMeadOptions::new(tolerance, settings.max_iter)
                        .with_max_fun(settings.max_fun);
                    let res = nelder_mead(objective, &x0, &options);
                    RunOutcome {
                        x: res.x,
                        fun: res.fun,
                        iterations: res.iterations,
                        evaluations: res.evaluations,
                        converged: res.converged,
                        all_vecs: res.all_vecs,
                    }
                }
                Method::BasinHopping => {
                    let options = BasinHoppingOptions::from_settings(
                        &settings.basin_hopping,
                        tolerance,
                        settings.max_iter,
                        settings.max_fun,
                    );
                    let builder = settings.curve;
                    let accept = |x: &[f64]| {
                        ControlPointSet::from_flat(x)
                            .map(|points| builder.is_valid(&points))
                            .unwrap_or(false)
                    };
                    let res = basin_hopping(objective, &x0, &options, accept, rng);
                    debug!(
                        accepted = res.accepted,
                        rejected = res.rejected_by_test,
                        "basin-hopping finished"
                    );
                    RunOutcome {
                        x: res.x,
                        fun: res.fun,
                        iterations: res.local_iterations,
                        evaluations: res.evaluations,
                        converged: res.converged,
                        all_vecs: res.all_vecs,
                    }
                }
            }
        };

        let optpts = ControlPointSet::from_flat(&outcome.x)?;
        self.optpts = Some(optpts.clone());
        self.all_vecs.extend(outcome.all_vecs);
        self.update_best();

        let run_best = self.history[history_start..]
            .iter()
            .map(|e| e.fitness)
            .reduce(f64::min);
        self.runs.push(RunSummary {
            method: self.method,
            grade: self.grade,
            iterations: outcome.iterations,
            evaluations: outcome.evaluations,
            converged: outcome.converged,
            best_fit: run_best,
        });

        info!(
            name = %self.name,
            iterations = outcome.iterations,
            evaluations = outcome.evaluations,
            best_fit = ?self.best_fit,
            "bell optimized"
        );

        Ok(OptimizationResult {
            method: self.method,
            grade: self.grade,
            optpts,
            terminal_fit: outcome.fun,
            best_fit: self.best_fit,
            best_fq: self.best_fq.clone(),
            target: self.target.frequencies().to_vec(),
            iterations: outcome.iterations,
            evaluations: outcome.evaluations,
            converged: outcome.converged,
        })
    }

    /// Continue a coarse search at fine grade from its terminal shape.
    ///
    /// `c0` is restored afterwards so the bell keeps its original starting
    /// shape. Returns `Ok(None)` when the bell is already fine.
    ///
    /// # Errors
    /// [`CandidateError::NotOptimized`] when no coarse run has finished yet.
    pub fn refine<S, R>(
        &mut self,
        solver: &S,
        rng: &mut R,
    ) -> Result<Option<OptimizationResult>, CandidateError>
    where
        S: Eigensolver + ?Sized,
        R: Rng,
    {
        if self.grade == Grade::Fine {
            debug!(name = %self.name, "already refined");
            return Ok(None);
        }
        let optpts = self.optpts.clone().ok_or(CandidateError::NotOptimized)?;

        let original = std::mem::replace(&mut self.c0, optpts);
        self.grade = Grade::Fine;
        let result = self.optimize(solver, rng);
        self.c0 = original;

        match result {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                self.grade = Grade::Coarse;
                Err(e)
            }
        }
    }
}
