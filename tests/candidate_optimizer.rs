mod common;

use bellshape::error::{CandidateError, MalformedInputError};
use bellshape::optimization::{MaterialParams, Target};
use bellshape::types::DEFAULT_CROSSPENALTY;
use bellshape::{Bell, Grade, Method};
use common::{AreaSolver, ConstantSolver, MissingSolver, figure_eight, polygon, quick_settings};
use rand::SeedableRng;
use rand::rngs::StdRng;

const TOL: f64 = 1e-9;

fn chord() -> Target {
    Target::new(vec![440.0, 660.0, 880.0]).unwrap()
}

fn hexagon_bell(max_iter: usize) -> Bell {
    Bell::new(chord(), MaterialParams::aluminum(), polygon(6, 60.0))
        .with_settings(quick_settings(max_iter))
}

#[test]
fn self_intersecting_shape_scores_at_least_crosspenalty() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut bell = hexagon_bell(10);
    let flat = figure_eight().flatten();
    for _ in 0..50 {
        let fit = bell.evaluate(&flat, &AreaSolver, &mut rng).unwrap();
        assert!(fit >= DEFAULT_CROSSPENALTY);
        assert!(fit < 2.0 * DEFAULT_CROSSPENALTY);
    }
    assert!(bell.history().is_empty());
}

#[test]
fn malformed_flat_vectors_are_rejected() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut bell = hexagon_bell(10);
    assert_eq!(
        bell.evaluate(&[1.0; 5], &AreaSolver, &mut rng).unwrap_err(),
        MalformedInputError::OddLength { len: 5 }
    );
    assert!(matches!(
        bell.evaluate(&[1.0, 2.0, 3.0, 4.0], &AreaSolver, &mut rng),
        Err(MalformedInputError::TooFewPoints { got: 2, .. })
    ));
}

#[test]
fn perfect_solver_scores_zero() {
    let mut rng = StdRng::seed_from_u64(3);
    let solver = ConstantSolver(vec![440.0, 660.0, 880.0, 1200.0]);
    let mut bell = hexagon_bell(10);
    let report = bell.simulate(&solver, &mut rng).unwrap();
    assert!(report.fitness.abs() < TOL);
    let evaluation = report.evaluation.unwrap();
    assert_eq!(evaluation.matched, vec![440.0, 660.0, 880.0]);
    assert_eq!(bell.best_fq(), Some(&[440.0, 660.0, 880.0][..]));
}

#[test]
fn best_so_far_never_increases() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut bell = hexagon_bell(40);
    bell.optimize(&AreaSolver, &mut rng).unwrap();

    let curve = bell.best_so_far();
    assert_eq!(curve.len(), bell.history().len());
    assert!(curve.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(curve.last().copied(), bell.best_fit());
}

#[test]
fn optimize_records_one_run_per_call() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut bell = hexagon_bell(15);
    let first = bell.optimize(&AreaSolver, &mut rng).unwrap();
    assert_eq!(first.grade, Grade::Coarse);
    assert_eq!(bell.runs().len(), 1);
    assert_eq!(bell.all_vecs().len(), first.iterations);
    assert_eq!(first.errors_in_cents().len(), 3);
    assert!(first.to_string().contains("Best fitness"));
}

#[test]
fn refine_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut bell = hexagon_bell(15);
    let c0 = bell.c0().clone();
    bell.optimize(&AreaSolver, &mut rng).unwrap();

    let refined = bell.refine(&AreaSolver, &mut rng).unwrap().unwrap();
    assert_eq!(refined.grade, Grade::Fine);
    assert_eq!(bell.grade(), Grade::Fine);
    assert_eq!(bell.c0(), &c0);

    let best_fit = bell.best_fit();
    let best_fq = bell.best_fq().map(<[f64]>::to_vec);
    let history = bell.history().len();
    let optpts = bell.optpts().cloned();

    assert!(bell.refine(&AreaSolver, &mut rng).unwrap().is_none());
    assert_eq!(bell.best_fit(), best_fit);
    assert_eq!(bell.best_fq().map(<[f64]>::to_vec), best_fq);
    assert_eq!(bell.history().len(), history);
    assert_eq!(bell.optpts().cloned(), optpts);
}

#[test]
fn refine_requires_a_coarse_run() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut bell = hexagon_bell(15);
    assert!(matches!(
        bell.refine(&AreaSolver, &mut rng),
        Err(CandidateError::NotOptimized)
    ));
}

#[test]
fn missing_solver_is_not_a_penalty() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut bell = hexagon_bell(15);
    let err = bell.optimize(&MissingSolver, &mut rng).unwrap_err();
    assert!(matches!(err, CandidateError::SolverUnavailable(_)));
    assert!(bell.history().is_empty());
    assert!(bell.optpts().is_none());
}

#[test]
fn basin_hopping_never_ends_worse_than_start() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut settings = quick_settings(10);
    settings.basin_hopping.niter = 3;
    let mut bell = Bell::new(chord(), MaterialParams::aluminum(), polygon(6, 60.0))
        .with_settings(settings)
        .with_method(Method::BasinHopping);

    let start = bell.simulate(&AreaSolver, &mut rng).unwrap().fitness;
    let result = bell.optimize(&AreaSolver, &mut rng).unwrap();
    assert_eq!(result.method, Method::BasinHopping);
    assert!(result.best_fit.unwrap() <= start);
    assert_eq!(bell.runs()[0].method, Method::BasinHopping);
}

#[test]
fn random_bells_start_valid() {
    let mut rng = StdRng::seed_from_u64(10);
    let settings = quick_settings(5);
    let builder = settings.curve;
    let bell = Bell::random(chord(), MaterialParams::aluminum(), 150.0, 5, settings, &mut rng)
        .unwrap();
    assert_eq!(bell.c0().len(), 5);
    assert!(builder.is_valid(bell.c0()));
}
