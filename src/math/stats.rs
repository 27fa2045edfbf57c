//! Descriptive statistics over `f64` slices.
//!
//! Conventions follow the usual numerical-Python defaults so reports line up
//! with results produced elsewhere:
//!
//! - `std` is the population standard deviation (divide by `n`)
//! - `sample_variance` divides by `n - 1`
//! - `quantile` interpolates linearly between order statistics
//! - ties in `average_ranks` receive the mean of the ranks they span

use std::cmp::Ordering;

/// Arithmetic mean. Returns `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Unbiased sample variance. Returns `NaN` when fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    ss / (values.len() as f64 - 1.0)
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Sorted copy of `values` (NaNs compare equal and end up wherever the sort leaves them).
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Linear-interpolation quantile (`numpy.quantile` default method).
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let s = sorted(values);
    quantile_sorted(&s, q)
}

/// Quantile of an already sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Most frequent integer value; the smallest value wins ties.
///
/// Values are rounded to the nearest integer before counting.
pub fn integer_mode(values: &[f64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut ints: Vec<i64> = values.iter().map(|v| v.round() as i64).collect();
    ints.sort_unstable();

    let mut best = ints[0];
    let mut best_count = 0usize;
    let mut i = 0;
    while i < ints.len() {
        let mut j = i;
        while j < ints.len() && ints[j] == ints[i] {
            j += 1;
        }
        if j - i > best_count {
            best_count = j - i;
            best = ints[i];
        }
        i = j;
    }
    Some(best)
}

/// 1-based ranks with ties averaged (`scipy.stats.rankdata(method="average")`).
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j share the average of ranks (i+1)..=(j+1).
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Numerically stable `ln(Σ exp(x_i))`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let m = max(values);
    if !m.is_finite() {
        return m;
    }
    let s: f64 = values.iter().map(|v| (v - m).exp()).sum();
    m + s.ln()
}
