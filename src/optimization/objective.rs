//! Fitness function and mode selection.

/// Relative chi-square error between target and computed frequencies.
///
/// score = mean((t_i - a_i)² / t_i)
///
/// Both slices are expected to have the same length; extra entries in the
/// longer one are ignored. An empty comparison scores `+inf`.
///
/// # Example
/// ```
/// use bellshape::optimization::objective::score;
///
/// assert_eq!(score(&[440.0, 880.0], &[440.0, 880.0]), 0.0);
/// assert!((score(&[440.0], &[220.0]) - 110.0).abs() < 1e-12);
/// ```
pub fn score(target: &[f64], actual: &[f64]) -> f64 {
    debug_assert_eq!(target.len(), actual.len());
    let m = target.len().min(actual.len());
    if m == 0 {
        return f64::INFINITY;
    }

    let sum: f64 = target
        .iter()
        .zip(actual)
        .map(|(&t, &a)| (t - a) * (t - a) / t)
        .sum();
    sum / m as f64
}

/// Narrow the solver's modes down to the ones comparable with `target`.
///
/// Modes strictly inside `(min - tolerance, max + tolerance)` are kept.
/// Modes above the window are kept while the pool is still shorter than the
/// target; the first one after that ends the scan. Modes below the window
/// are skipped. The pool is then sub-sampled at indices
/// `ceil(k * len / n)` for `k = 0..n`.
///
/// Returns `None` when the pool ends up shorter than the target.
pub fn select_frequencies(solved: &[f64], target: &[f64], tolerance: f64) -> Option<Vec<f64>> {
    let n = target.len();
    if n == 0 {
        return None;
    }
    let lo = target.iter().copied().fold(f64::INFINITY, f64::min) - tolerance;
    let hi = target.iter().copied().fold(f64::NEG_INFINITY, f64::max) + tolerance;

    let mut pool = Vec::with_capacity(n);
    for &fq in solved {
        if fq > lo && fq < hi {
            pool.push(fq);
        } else if fq > hi {
            if pool.len() < n {
                pool.push(fq);
            } else {
                break;
            }
        }
    }

    if pool.len() < n {
        return None;
    }

    let len = pool.len();
    Some(
        (0..n)
            .map(|k| pool[(k * len).div_ceil(n)])
            .collect(),
    )
}

/// Compute cents error between computed and target frequency.
pub fn compute_cents_error(computed: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    1200.0 * (computed / target).log2()
}

/// Compute cents errors for all frequencies.
pub fn compute_cents_errors(computed_freq: &[f64], target_freq: &[f64]) -> Vec<f64> {
    computed_freq
        .iter()
        .zip(target_freq.iter())
        .map(|(&comp, &target)| compute_cents_error(comp, target))
        .collect()
}

/// Running minimum of a fitness sequence.
pub fn running_minimum(fits: impl IntoIterator<Item = f64>) -> Vec<f64> {
    fits.into_iter()
        .scan(f64::INFINITY, |best, fit| {
            *best = best.min(fit);
            Some(*best)
        })
        .collect()
}
