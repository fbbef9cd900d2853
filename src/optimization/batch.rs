//! Batch controller: many bells, many targets, one worker pool.
//!
//! Bells move through three buckets keyed by target:
//!
//! - **pending**: created, not yet optimized;
//! - **roughed**: optimized at coarse grade without reaching the fit
//!   tolerance;
//! - **finished**: reached the tolerance, or refined at fine grade.
//!
//! Workers receive whole bells by value and hand them back; only the
//! controller touches the buckets. The state is checkpointed as JSON after
//! every batch.

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::eigensolver::{Eigensolver, unique_run_name};
use crate::error::{BatchError, CandidateError};
use crate::geometry::ControlPointSet;
use crate::types::{DEFAULT_CONTROL_POINTS, DEFAULT_SHAPE_SCALE, Grade, Method};

use super::bell::Bell;
use super::types::{MaterialParams, OptimizerSettings, Target};

// ============================================================================
// Buckets
// ============================================================================

/// Bells grouped by target. A target key never maps to an empty list.
#[derive(Debug, Clone, Default)]
pub struct Buckets(BTreeMap<Target, Vec<Bell>>);

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bell: Bell) {
        self.0.entry(bell.target().clone()).or_default().push(bell);
    }

    /// Drop every bell for `target`.
    pub fn remove(&mut self, target: &Target) -> Vec<Bell> {
        self.0.remove(target).unwrap_or_default()
    }

    /// Pop a bell from a uniformly chosen target.
    pub fn take_random<R: Rng>(&mut self, rng: &mut R) -> Option<Bell> {
        if self.0.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.0.len());
        let target = self.0.keys().nth(index)?.clone();
        self.take_last(&target)
    }

    fn take_last(&mut self, target: &Target) -> Option<Bell> {
        let bells = self.0.get_mut(target)?;
        let bell = bells.pop();
        if bells.is_empty() {
            self.0.remove(target);
        }
        bell
    }

    /// Remove and return the lowest-`best_fit` bell for `target`.
    ///
    /// Bells that never produced a valid evaluation rank last.
    pub fn take_best(&mut self, target: &Target) -> Option<Bell> {
        let bells = self.0.get_mut(target)?;
        let index = bells
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| fit_rank(a).total_cmp(&fit_rank(b)))
            .map(|(i, _)| i)?;
        let bell = bells.swap_remove(index);
        if bells.is_empty() {
            self.0.remove(target);
        }
        Some(bell)
    }

    /// Lowest-`best_fit` bell for `target`, left in place.
    pub fn best(&self, target: &Target) -> Option<&Bell> {
        self.0
            .get(target)?
            .iter()
            .min_by(|a, b| fit_rank(a).total_cmp(&fit_rank(b)))
    }

    pub fn get(&self, target: &Target) -> &[Bell] {
        self.0.get(target).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, target: &Target) -> bool {
        self.0.contains_key(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Target, &[Bell])> {
        self.0.iter().map(|(t, bells)| (t, bells.as_slice()))
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of bells across all targets.
    pub fn candidate_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

fn fit_rank(bell: &Bell) -> f64 {
    bell.best_fit().unwrap_or(f64::INFINITY)
}

impl From<Vec<(Target, Vec<Bell>)>> for Buckets {
    fn from(entries: Vec<(Target, Vec<Bell>)>) -> Self {
        let mut buckets = Buckets::new();
        for (target, bells) in entries {
            if !bells.is_empty() {
                buckets.0.entry(target).or_default().extend(bells);
            }
        }
        buckets
    }
}

impl From<Buckets> for Vec<(Target, Vec<Bell>)> {
    fn from(buckets: Buckets) -> Self {
        buckets.0.into_iter().collect()
    }
}

impl Serialize for Buckets {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for Buckets {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<(Target, Vec<Bell>)>::deserialize(deserializer).map(Buckets::from)
    }
}

// ============================================================================
// Configuration and state
// ============================================================================

/// Batch controller settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrent optimizations, 0 for one per available core.
    pub workers: usize,
    /// Where to checkpoint after every batch.
    pub checkpoint: Option<PathBuf>,
    /// Base seed; drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl BatchConfig {
    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Everything needed to continue a batch after a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchState {
    pub pending: Buckets,
    pub roughed: Buckets,
    pub finished: Buckets,
    pub seed: u64,
    pub next_task: u64,
}

/// Starting shape of new candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialShape {
    /// Every candidate starts from these points.
    Fixed(ControlPointSet),
    /// A fresh random roughly circular shape per candidate.
    RandomCircle { points: usize, scale: f64 },
}

impl Default for InitialShape {
    fn default() -> Self {
        InitialShape::RandomCircle {
            points: DEFAULT_CONTROL_POINTS,
            scale: DEFAULT_SHAPE_SCALE,
        }
    }
}

/// Template for the candidates of one target.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateParams {
    pub material: MaterialParams,
    pub grade: Grade,
    pub method: Method,
    pub settings: OptimizerSettings,
    pub shape: InitialShape,
}

// ============================================================================
// Worker tasks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Rough,
    Refine,
}

struct Task {
    id: u64,
    bell: Bell,
}

enum TaskFailure {
    Panicked(String),
    Failed(CandidateError),
}

struct TaskOutcome {
    id: u64,
    /// Bell as it was handed to the worker.
    original: Bell,
    result: Result<Bell, TaskFailure>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

fn run_task<S: Eigensolver>(solver: &S, seed: u64, stage: Stage, task: Task) -> TaskOutcome {
    let Task { id, bell } = task;
    let original = bell.clone();
    let mut rng = StdRng::seed_from_u64(seed ^ id);

    let caught = panic::catch_unwind(AssertUnwindSafe(move || {
        let mut bell = bell;
        let result = match stage {
            Stage::Rough => bell.optimize(solver, &mut rng).map(|_| ()),
            Stage::Refine => bell.refine(solver, &mut rng).map(|_| ()),
        };
        result.map(|()| bell)
    }));

    let result = match caught {
        Ok(Ok(bell)) => Ok(bell),
        Ok(Err(e)) => Err(TaskFailure::Failed(e)),
        Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
    };
    TaskOutcome {
        id,
        original,
        result,
    }
}

/// Run every task on the worker pool, results in task order.
#[cfg(feature = "parallel")]
fn run_batch<S: Eigensolver>(
    pool: &rayon::ThreadPool,
    solver: &S,
    seed: u64,
    stage: Stage,
    tasks: Vec<Task>,
) -> Vec<TaskOutcome> {
    pool.install(|| {
        tasks
            .into_par_iter()
            .map(|task| run_task(solver, seed, stage, task))
            .collect()
    })
}

/// Run every task in turn (without the `parallel` feature).
#[cfg(not(feature = "parallel"))]
fn run_batch<S: Eigensolver>(
    solver: &S,
    seed: u64,
    stage: Stage,
    tasks: Vec<Task>,
) -> Vec<TaskOutcome> {
    tasks
        .into_iter()
        .map(|task| run_task(solver, seed, stage, task))
        .collect()
}

// ============================================================================
// Controller
// ============================================================================

/// Drives pending bells to roughed or finished, and roughed bells to
/// finished, on a pool of workers.
pub struct BatchController<S: Eigensolver> {
    solver: S,
    config: BatchConfig,
    state: BatchState,
    workers: usize,
    rng: StdRng,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl<S: Eigensolver> BatchController<S> {
    /// Controller with empty buckets.
    ///
    /// # Errors
    /// [`BatchError::ThreadPool`] when the worker pool cannot be created.
    pub fn new(solver: S, config: BatchConfig) -> Result<Self, BatchError> {
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
        let state = BatchState {
            seed,
            ..BatchState::default()
        };
        Self::with_state(solver, config, state)
    }

    /// Controller restored from the checkpoint named in `config`.
    pub fn resume(solver: S, config: BatchConfig) -> Result<Self, BatchError> {
        let path = config
            .checkpoint
            .clone()
            .ok_or(BatchError::NoCheckpointPath)?;
        let state = load_checkpoint(&path)?;
        info!(
            path = %path.display(),
            pending = state.pending.candidate_count(),
            roughed = state.roughed.candidate_count(),
            finished = state.finished.candidate_count(),
            "resumed batch"
        );
        Self::with_state(solver, config, state)
    }

    fn with_state(solver: S, config: BatchConfig, state: BatchState) -> Result<Self, BatchError> {
        let workers = config.worker_count();
        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| BatchError::ThreadPool(e.to_string()))?;
        let rng = StdRng::seed_from_u64(state.seed ^ state.next_task.rotate_left(32));
        Ok(Self {
            solver,
            config,
            state,
            workers,
            rng,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub fn pending(&self) -> &Buckets {
        &self.state.pending
    }

    pub fn roughed(&self) -> &Buckets {
        &self.state.roughed
    }

    pub fn finished(&self) -> &Buckets {
        &self.state.finished
    }

    /// Add `n` new candidates for `target` to pending.
    pub fn make_candidates(
        &mut self,
        target: &Target,
        params: &CandidateParams,
        n: usize,
    ) -> Result<(), BatchError> {
        for _ in 0..n {
            let bell = match &params.shape {
                InitialShape::Fixed(points) => {
                    Bell::new(target.clone(), params.material.clone(), points.clone())
                        .with_settings(params.settings.clone())
                }
                InitialShape::RandomCircle { points, scale } => Bell::random(
                    target.clone(),
                    params.material.clone(),
                    *scale,
                    *points,
                    params.settings.clone(),
                    &mut self.rng,
                )
                .map_err(|source| BatchError::Candidate {
                    target: target.clone(),
                    source,
                })?,
            };
            let bell = bell
                .with_grade(params.grade)
                .with_method(params.method)
                .with_name(unique_run_name(&mut self.rng));
            debug!(name = bell.name(), target = %target, "created candidate");
            self.state.pending.push(bell);
        }
        info!(target = %target, count = n, "queued candidates");
        Ok(())
    }

    fn next_batch(&mut self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.workers);
        while tasks.len() < self.workers {
            let Some(bell) = self.state.pending.take_random(&mut self.rng) else {
                break;
            };
            tasks.push(Task {
                id: self.state.next_task,
                bell,
            });
            self.state.next_task += 1;
        }
        tasks
    }

    fn dispatch(&self, stage: Stage, tasks: Vec<Task>) -> Vec<TaskOutcome> {
        #[cfg(feature = "parallel")]
        {
            run_batch(&self.pool, &self.solver, self.state.seed, stage, tasks)
        }
        #[cfg(not(feature = "parallel"))]
        {
            run_batch(&self.solver, self.state.seed, stage, tasks)
        }
    }

    /// Optimize pending bells in batches of up to `workers` until pending
    /// is empty.
    ///
    /// A bell with `best_fit < fit_tolerance` finishes its target: the
    /// target's remaining pending bells are dropped.
    ///
    /// # Errors
    /// The first worker failure of a batch, after the rest of that batch has
    /// been merged and checkpointed. The failed bell is back in pending.
    pub fn process_candidates(&mut self, fit_tolerance: f64) -> Result<(), BatchError> {
        while !self.state.pending.is_empty() {
            let tasks = self.next_batch();
            info!(
                tasks = tasks.len(),
                remaining = self.state.pending.candidate_count(),
                "running batch"
            );
            let outcomes = self.dispatch(Stage::Rough, tasks);

            let mut failure = None;
            for outcome in outcomes {
                match outcome.result {
                    Ok(bell) => self.merge_roughed(bell, fit_tolerance),
                    Err(reason) => {
                        let target = outcome.original.target().clone();
                        if !self.state.finished.contains(&target) {
                            self.state.pending.push(outcome.original);
                        }
                        let err = task_error(outcome.id, target, reason);
                        failure = failure.or(Some(err));
                    }
                }
            }

            self.save_checkpoint()?;
            if let Some(err) = failure {
                return Err(err);
            }
        }
        Ok(())
    }

    fn merge_roughed(&mut self, bell: Bell, fit_tolerance: f64) {
        let adequate = bell.best_fit().is_some_and(|fit| fit < fit_tolerance);
        if adequate {
            let dropped = self.state.pending.remove(bell.target());
            info!(
                name = bell.name(),
                target = %bell.target(),
                best_fit = ?bell.best_fit(),
                dropped = dropped.len(),
                "target reached tolerance"
            );
            self.state.finished.push(bell);
        } else {
            debug!(name = bell.name(), best_fit = ?bell.best_fit(), "roughed");
            self.state.roughed.push(bell);
        }
    }

    /// Refine the best roughed bell of every target that has not finished.
    ///
    /// # Errors
    /// [`BatchError::NoCandidates`] when nothing is roughed; otherwise the
    /// first worker failure, with the failed bell back in roughed.
    pub fn refine_candidates(&mut self) -> Result<(), BatchError> {
        if self.state.roughed.is_empty() {
            return Err(BatchError::NoCandidates);
        }

        let targets: Vec<Target> = self.state.roughed.targets().cloned().collect();
        let mut tasks = Vec::new();
        for target in targets {
            // a finished target already has its finalist
            if self.state.finished.contains(&target) {
                debug!(target = %target, "already finished, not refining");
                continue;
            }
            if let Some(bell) = self.state.roughed.take_best(&target) {
                tasks.push(Task {
                    id: self.state.next_task,
                    bell,
                });
                self.state.next_task += 1;
            }
        }
        info!(tasks = tasks.len(), "refining candidates");

        let outcomes = self.dispatch(Stage::Refine, tasks);
        let mut failure = None;
        for outcome in outcomes {
            match outcome.result {
                Ok(bell) => {
                    info!(name = bell.name(), best_fit = ?bell.best_fit(), "refined");
                    self.state.finished.push(bell);
                }
                Err(reason) => {
                    let target = outcome.original.target().clone();
                    self.state.roughed.push(outcome.original);
                    let err = task_error(outcome.id, target, reason);
                    failure = failure.or(Some(err));
                }
            }
        }

        self.save_checkpoint()?;
        failure.map_or(Ok(()), Err)
    }

    /// Best finished bell for `target`.
    pub fn finalist(&self, target: &Target) -> Option<&Bell> {
        self.state.finished.best(target)
    }

    /// Write the state to the configured checkpoint, if any.
    ///
    /// The file is replaced atomically through a temporary file in the same
    /// directory.
    pub fn save_checkpoint(&self) -> Result<(), BatchError> {
        let Some(path) = &self.config.checkpoint else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.state)?;
        let io_err = |source| BatchError::Checkpoint {
            path: path.clone(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        debug!(path = %path.display(), "checkpoint written");
        Ok(())
    }
}

fn task_error(id: u64, target: Target, reason: TaskFailure) -> BatchError {
    match reason {
        TaskFailure::Panicked(message) => {
            warn!(task = id, target = %target, %message, "worker panicked");
            BatchError::WorkerPanicked { target, message }
        }
        TaskFailure::Failed(source) => {
            warn!(task = id, target = %target, error = %source, "candidate failed");
            BatchError::Candidate { target, source }
        }
    }
}

/// Read a checkpoint written by [`BatchController::save_checkpoint`].
pub fn load_checkpoint(path: &Path) -> Result<BatchState, BatchError> {
    let bytes = fs::read(path).map_err(|source| BatchError::Checkpoint {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::f64::consts::TAU;

    fn hexagon() -> ControlPointSet {
        let points: Vec<Point2<f64>> = (0..6)
            .map(|k| {
                let t = TAU * k as f64 / 6.0;
                Point2::new(60.0 * t.cos(), 60.0 * t.sin())
            })
            .collect();
        ControlPointSet::from_points(&points).unwrap()
    }

    fn bell(freqs: &[f64]) -> Bell {
        let target = Target::new(freqs.to_vec()).unwrap();
        Bell::new(target, MaterialParams::aluminum(), hexagon())
    }

    #[test]
    fn buckets_never_keep_empty_lists() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut buckets = Buckets::new();
        buckets.push(bell(&[440.0]));
        buckets.push(bell(&[440.0]));
        buckets.push(bell(&[550.0]));
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets.candidate_count(), 3);

        let mut drawn = Vec::new();
        while let Some(bell) = buckets.take_random(&mut rng) {
            drawn.push(bell.target().clone());
            assert!(buckets.iter().all(|(_, bells)| !bells.is_empty()));
        }
        assert!(buckets.is_empty());
        assert_eq!(drawn.len(), 3);
        assert!(drawn.contains(&Target::new(vec![440.0]).unwrap()));
        assert!(drawn.contains(&Target::new(vec![550.0]).unwrap()));
    }

    #[test]
    fn take_best_prefers_evaluated_bells() {
        let target = Target::new(vec![440.0]).unwrap();
        let mut buckets = Buckets::new();
        buckets.push(bell(&[440.0]).with_name("untested"));
        let best = buckets.take_best(&target).unwrap();
        assert_eq!(best.name(), "untested");
        assert!(!buckets.contains(&target));
        assert!(buckets.take_best(&target).is_none());
    }

    #[test]
    fn buckets_serialize_as_pairs() {
        let mut buckets = Buckets::new();
        buckets.push(bell(&[440.0, 660.0]));
        let json = serde_json::to_value(&buckets).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(1));
        assert_eq!(json[0][0], serde_json::json!([440.0, 660.0]));

        let back: Buckets = serde_json::from_value(json).unwrap();
        assert_eq!(back.candidate_count(), 1);

        let empty: Buckets = serde_json::from_str("[[[440.0], []]]").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn zero_workers_means_all_cores() {
        let config = BatchConfig::default();
        assert!(config.worker_count() >= 1);
        let config = BatchConfig {
            workers: 3,
            ..BatchConfig::default()
        };
        assert_eq!(config.worker_count(), 3);
    }

    fn static_panic() {
        panic!("mesh exploded")
    }

    fn formatted_panic() {
        panic!("{} modes", 3)
    }

    #[test]
    fn panic_messages_are_recovered() {
        let caught = panic::catch_unwind(static_panic).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "mesh exploded");
        let caught = panic::catch_unwind(formatted_panic).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "3 modes");
    }

    #[test]
    fn initial_shape_defaults_to_random_circle() {
        assert_eq!(
            CandidateParams::default().shape,
            InitialShape::RandomCircle {
                points: 5,
                scale: 150.0
            }
        );
    }
}
