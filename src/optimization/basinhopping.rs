//! Basin-hopping global search with a simplex local minimizer.
//!
//! Each hop displaces the current minimum uniformly by up to `step_size` per
//! coordinate. Hops rejected by the caller's accept test are skipped before
//! the local minimization; the rest are minimized locally and accepted by
//! the Metropolis criterion. The step size is adapted toward a target
//! acceptance rate every `interval` hops.

use rand::Rng;
use tracing::debug;

use super::neldermead::{NelderMeadOptions, nelder_mead};
use super::types::BasinHoppingSettings;

/// Parameters for [`basin_hopping`].
#[derive(Debug, Clone, PartialEq)]
pub struct BasinHoppingOptions {
    pub niter: usize,
    pub step_size: f64,
    pub temperature: f64,
    pub interval: usize,
    pub target_accept_rate: f64,
    pub step_factor: f64,
    /// Options for every local minimization.
    pub local: NelderMeadOptions,
}

impl BasinHoppingOptions {
    /// Options from bell settings, with local tolerance `tolerance * local_tol_factor`.
    pub fn from_settings(
        settings: &BasinHoppingSettings,
        tolerance: f64,
        max_iter: usize,
        max_fun: Option<usize>,
    ) -> Self {
        Self {
            niter: settings.niter,
            step_size: settings.step_size,
            temperature: settings.temperature,
            interval: settings.interval,
            target_accept_rate: settings.target_accept_rate,
            step_factor: settings.step_factor,
            local: NelderMeadOptions::new(tolerance * settings.local_tol_factor, max_iter)
                .with_max_fun(max_fun),
        }
    }
}

/// Outcome of a basin-hopping run.
#[derive(Debug, Clone)]
pub struct BasinHoppingResult {
    /// Lowest accepted local minimum.
    pub x: Vec<f64>,
    pub fun: f64,
    /// Hops attempted.
    pub hops: usize,
    /// Hops accepted by the Metropolis criterion.
    pub accepted: usize,
    /// Hops discarded by the accept test before local minimization.
    pub rejected_by_test: usize,
    /// Simplex iterations summed over all local minimizations.
    pub local_iterations: usize,
    pub evaluations: usize,
    /// Whether the local minimization that produced `x` converged.
    pub converged: bool,
    /// Best simplex vertex per iteration, across all local runs.
    pub all_vecs: Vec<Vec<f64>>,
}

/// Metropolis acceptance: always take improvements, take a worse energy
/// with probability `exp(-(new - old) / T)`.
fn metropolis<R: Rng>(new: f64, old: f64, temperature: f64, rng: &mut R) -> bool {
    if new < old {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    let w = (-(new - old) / temperature).min(0.0).exp();
    w >= rng.r#gen::<f64>()
}

/// Global minimization of `f` starting from `x0`.
///
/// `accept_test` sees each displaced point before it is minimized and can
/// veto it.
pub fn basin_hopping<F, A, R>(
    mut f: F,
    x0: &[f64],
    options: &BasinHoppingOptions,
    mut accept_test: A,
    rng: &mut R,
) -> BasinHoppingResult
where
    F: FnMut(&[f64]) -> f64,
    A: FnMut(&[f64]) -> bool,
    R: Rng,
{
    let first = nelder_mead(&mut f, x0, &options.local);
    let mut evaluations = first.evaluations;
    let mut local_iterations = first.iterations;
    let mut all_vecs = first.all_vecs;

    let mut x = first.x;
    let mut energy = first.fun;
    let mut best_x = x.clone();
    let mut best_energy = energy;
    let mut best_converged = first.converged;

    let mut step = options.step_size.abs();
    let mut accepted = 0;
    let mut rejected_by_test = 0;

    for hop in 0..options.niter {
        let trial: Vec<f64> = x
            .iter()
            .map(|v| v + (2.0 * rng.r#gen::<f64>() - 1.0) * step)
            .collect();

        if accept_test(&trial) {
            let local = nelder_mead(&mut f, &trial, &options.local);
            evaluations += local.evaluations;
            local_iterations += local.iterations;
            all_vecs.extend(local.all_vecs);

            if metropolis(local.fun, energy, options.temperature, rng) {
                accepted += 1;
                energy = local.fun;
                x = local.x;
                if energy < best_energy {
                    debug!(hop, energy, "new global minimum");
                    best_energy = energy;
                    best_x = x.clone();
                    best_converged = local.converged;
                }
            }
        } else {
            rejected_by_test += 1;
        }

        if options.interval > 0 && (hop + 1) % options.interval == 0 {
            let rate = accepted as f64 / (hop + 1) as f64;
            if rate > options.target_accept_rate {
                step /= options.step_factor;
            } else {
                step *= options.step_factor;
            }
            debug!(hop, rate, step, "adjusted basin-hopping step");
        }
    }

    BasinHoppingResult {
        x: best_x,
        fun: best_energy,
        hops: options.niter,
        accepted,
        rejected_by_test,
        local_iterations,
        evaluations,
        converged: best_converged,
        all_vecs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn options(niter: usize, step_size: f64) -> BasinHoppingOptions {
        BasinHoppingOptions {
            niter,
            step_size,
            temperature: 1.0,
            interval: 10,
            target_accept_rate: 0.5,
            step_factor: 0.9,
            local: NelderMeadOptions::new(1e-8, 500),
        }
    }

    /// Two wells, the deeper one at x = 4.
    fn double_well(x: &[f64]) -> f64 {
        let a = (x[0] + 2.0).powi(2);
        let b = (x[0] - 4.0).powi(2) - 3.0;
        a.min(b)
    }

    #[test]
    fn escapes_shallow_well() {
        let mut rng = StdRng::seed_from_u64(7);
        let res = basin_hopping(double_well, &[-2.5], &options(60, 5.0), |_| true, &mut rng);
        assert!((res.x[0] - 4.0).abs() < 1e-3, "stuck at {}", res.x[0]);
        assert!((res.fun + 3.0).abs() < 1e-6);
    }

    #[test]
    fn accept_test_vetoes_before_minimizing() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut calls = 0;
        let res = basin_hopping(
            |x: &[f64]| {
                calls += 1;
                x[0] * x[0]
            },
            &[1.0],
            &options(25, 1.0),
            |_| false,
            &mut rng,
        );
        assert_eq!(res.rejected_by_test, 25);
        assert_eq!(res.accepted, 0);
        assert_eq!(calls, res.evaluations);
    }

    #[test]
    fn result_is_never_worse_than_first_minimum() {
        let mut rng = StdRng::seed_from_u64(11);
        let first = nelder_mead(double_well, &[-2.5], &NelderMeadOptions::new(1e-8, 500));
        let res = basin_hopping(double_well, &[-2.5], &options(10, 0.5), |_| true, &mut rng);
        assert!(res.fun <= first.fun);
    }

    #[test]
    fn metropolis_rules() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(metropolis(1.0, 2.0, 1.0, &mut rng));
        assert!(!metropolis(3.0, 2.0, 0.0, &mut rng));
        assert!(!metropolis(1e6, 0.0, 1.0, &mut rng));
    }
}
