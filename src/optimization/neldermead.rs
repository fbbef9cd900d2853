//! Nelder-Mead downhill simplex.
//!
//! Follows the classic `fmin` formulation: the initial simplex perturbs each
//! coordinate by 5 % (or sets it to 0.00025 when zero), and the run stops
//! once both the vertex spread and the value spread fall within tolerance.

use std::cmp::Ordering;

const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const PSI: f64 = 0.5;
const SIGMA: f64 = 0.5;
const NONZDELT: f64 = 0.05;
const ZDELT: f64 = 0.00025;

/// Stopping criteria for [`nelder_mead`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    /// Largest allowed coordinate distance between best and other vertices.
    pub xatol: f64,
    /// Largest allowed value difference between best and other vertices.
    pub fatol: f64,
    pub max_iter: usize,
    /// Cap on objective calls, unlimited when `None`.
    pub max_fun: Option<usize>,
}

impl NelderMeadOptions {
    pub fn new(tolerance: f64, max_iter: usize) -> Self {
        Self {
            xatol: tolerance,
            fatol: tolerance,
            max_iter,
            max_fun: None,
        }
    }

    pub fn with_max_fun(mut self, max_fun: Option<usize>) -> Self {
        self.max_fun = max_fun;
        self
    }
}

/// Outcome of a simplex run.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best vertex at termination.
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
    /// Stopped on tolerance rather than on an iteration or call cap.
    pub converged: bool,
    /// Best vertex after each iteration.
    pub all_vecs: Vec<Vec<f64>>,
}

struct Counted<F> {
    f: F,
    calls: usize,
}

impl<F: FnMut(&[f64]) -> f64> Counted<F> {
    fn call(&mut self, x: &[f64]) -> f64 {
        self.calls += 1;
        (self.f)(x)
    }
}

/// `a * p + b * q`, coordinate-wise.
fn combine(a: f64, p: &[f64], b: f64, q: &[f64]) -> Vec<f64> {
    p.iter().zip(q).map(|(pi, qi)| a * pi + b * qi).collect()
}

fn sort_simplex(sim: &mut Vec<Vec<f64>>, fsim: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..fsim.len()).collect();
    order.sort_by(|&i, &j| fsim[i].partial_cmp(&fsim[j]).unwrap_or(Ordering::Equal));
    *sim = order.iter().map(|&i| sim[i].clone()).collect();
    *fsim = order.iter().map(|&i| fsim[i]).collect();
}

/// Minimize `f` from `x0` with the downhill simplex method.
///
/// # Example
/// ```
/// use bellshape::optimization::neldermead::{nelder_mead, NelderMeadOptions};
///
/// let res = nelder_mead(
///     |x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2),
///     &[0.0, 0.0],
///     &NelderMeadOptions::new(1e-8, 1000),
/// );
/// assert!(res.converged);
/// assert!((res.x[0] - 3.0).abs() < 1e-4);
/// ```
pub fn nelder_mead<F>(f: F, x0: &[f64], options: &NelderMeadOptions) -> NelderMeadResult
where
    F: FnMut(&[f64]) -> f64,
{
    let mut obj = Counted { f, calls: 0 };
    let n = x0.len();

    if n == 0 {
        let fun = obj.call(x0);
        return NelderMeadResult {
            x: Vec::new(),
            fun,
            iterations: 0,
            evaluations: obj.calls,
            converged: true,
            all_vecs: Vec::new(),
        };
    }

    let mut sim = Vec::with_capacity(n + 1);
    sim.push(x0.to_vec());
    for k in 0..n {
        let mut y = x0.to_vec();
        if y[k] != 0.0 {
            y[k] *= 1.0 + NONZDELT;
        } else {
            y[k] = ZDELT;
        }
        sim.push(y);
    }
    let mut fsim: Vec<f64> = sim.iter().map(|x| obj.call(x)).collect();
    sort_simplex(&mut sim, &mut fsim);

    let mut all_vecs = vec![sim[0].clone()];
    let mut iterations = 1;
    let mut converged = false;
    let under_fun_cap = |calls: usize| options.max_fun.is_none_or(|cap| calls < cap);

    while iterations < options.max_iter && under_fun_cap(obj.calls) {
        let x_spread = sim[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&sim[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = fsim[1..]
            .iter()
            .map(|fv| (fv - fsim[0]).abs())
            .fold(0.0, f64::max);
        if x_spread <= options.xatol && f_spread <= options.fatol {
            converged = true;
            break;
        }

        let mut xbar = vec![0.0; n];
        for vertex in &sim[..n] {
            for (c, v) in xbar.iter_mut().zip(vertex) {
                *c += v / n as f64;
            }
        }

        let xr = combine(1.0 + RHO, &xbar, -RHO, &sim[n]);
        let fxr = obj.call(&xr);
        let mut shrink = false;

        if fxr < fsim[0] {
            let xe = combine(1.0 + RHO * CHI, &xbar, -RHO * CHI, &sim[n]);
            let fxe = obj.call(&xe);
            if fxe < fxr {
                sim[n] = xe;
                fsim[n] = fxe;
            } else {
                sim[n] = xr;
                fsim[n] = fxr;
            }
        } else if fxr < fsim[n - 1] {
            sim[n] = xr;
            fsim[n] = fxr;
        } else if fxr < fsim[n] {
            // outside contraction
            let xc = combine(1.0 + PSI * RHO, &xbar, -PSI * RHO, &sim[n]);
            let fxc = obj.call(&xc);
            if fxc <= fxr {
                sim[n] = xc;
                fsim[n] = fxc;
            } else {
                shrink = true;
            }
        } else {
            // inside contraction
            let xcc = combine(1.0 - PSI, &xbar, PSI, &sim[n]);
            let fxcc = obj.call(&xcc);
            if fxcc < fsim[n] {
                sim[n] = xcc;
                fsim[n] = fxcc;
            } else {
                shrink = true;
            }
        }

        if shrink {
            for j in 1..=n {
                sim[j] = combine(1.0 - SIGMA, &sim[0], SIGMA, &sim[j]);
                fsim[j] = obj.call(&sim[j]);
            }
        }

        sort_simplex(&mut sim, &mut fsim);
        iterations += 1;
        all_vecs.push(sim[0].clone());
    }

    NelderMeadResult {
        x: sim.swap_remove(0),
        fun: fsim[0],
        iterations,
        evaluations: obj.calls,
        converged,
        all_vecs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosenbrock(x: &[f64]) -> f64 {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2)
    }

    #[test]
    fn minimizes_sphere() {
        let res = nelder_mead(
            |x: &[f64]| x.iter().map(|v| (v - 2.0).powi(2)).sum(),
            &[0.0, 1.0, -1.0, 5.0],
            &NelderMeadOptions::new(1e-10, 5000),
        );
        assert!(res.converged);
        for v in &res.x {
            assert!((v - 2.0).abs() < 1e-3, "coordinate {} not at minimum", v);
        }
    }

    #[test]
    fn minimizes_rosenbrock() {
        let res = nelder_mead(rosenbrock, &[-1.2, 1.0], &NelderMeadOptions::new(1e-10, 5000));
        assert!(res.converged);
        assert!((res.x[0] - 1.0).abs() < 1e-3);
        assert!((res.x[1] - 1.0).abs() < 1e-3);
        assert!(res.fun < 1e-8);
    }

    #[test]
    fn respects_iteration_cap() {
        let res = nelder_mead(rosenbrock, &[-1.2, 1.0], &NelderMeadOptions::new(1e-12, 10));
        assert!(!res.converged);
        assert_eq!(res.iterations, 10);
        assert_eq!(res.all_vecs.len(), res.iterations);
    }

    #[test]
    fn respects_call_cap() {
        let options = NelderMeadOptions::new(1e-12, 10_000).with_max_fun(Some(40));
        let res = nelder_mead(rosenbrock, &[-1.2, 1.0], &options);
        assert!(!res.converged);
        // the cap is checked per iteration, which costs at most n + 2 calls
        assert!(res.evaluations < 40 + 4);
    }

    #[test]
    fn loose_tolerance_stops_early() {
        let loose = nelder_mead(rosenbrock, &[-1.2, 1.0], &NelderMeadOptions::new(1.0, 300));
        let tight = nelder_mead(rosenbrock, &[-1.2, 1.0], &NelderMeadOptions::new(0.1, 300));
        assert!(loose.converged);
        assert!(loose.evaluations <= tight.evaluations);
    }

    #[test]
    fn zero_coordinates_get_small_offset() {
        let mut seen = Vec::new();
        nelder_mead(
            |x: &[f64]| {
                seen.push(x.to_vec());
                x[0] * x[0]
            },
            &[0.0],
            &NelderMeadOptions::new(1.0, 1),
        );
        assert_eq!(seen[1], vec![ZDELT]);
    }

    #[test]
    fn best_value_never_worse_than_start() {
        let start = [3.0, -2.0];
        let res = nelder_mead(rosenbrock, &start, &NelderMeadOptions::new(1e-6, 200));
        assert!(res.fun <= rosenbrock(&start));
    }
}
