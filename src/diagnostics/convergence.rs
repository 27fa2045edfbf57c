//! Rank-normalized split-chain R-hat and effective sample size.
//!
//! Reference: Vehtari, Gelman, Simpson, Carpenter, Bürkner (2021),
//! "Rank-normalization, folding, and localization: an improved R-hat".
//!
//! All functions take `chains[chain][draw]`. Chains must share a length.
//!
//! Degenerate inputs:
//! - fewer than [`MIN_DRAWS`] draws per chain gives `NaN`
//! - draws that are all identical give R-hat `1.0` and ESS equal to the
//!   total number of draws

use statrs::distribution::{ContinuousCDF, Normal};

use crate::math;

/// Minimum draws per chain for any diagnostic to be defined.
pub const MIN_DRAWS: usize = 4;

/// Values closer than this are treated as identical.
const RESOLUTION: f64 = 1e-15;

fn total(chains: &[Vec<f64>]) -> usize {
    chains.iter().map(Vec::len).sum()
}

fn is_degenerate(chains: &[Vec<f64>]) -> bool {
    chains.is_empty() || chains.iter().any(|c| c.len() < MIN_DRAWS || c.len() != chains[0].len())
}

fn is_constant(chains: &[Vec<f64>]) -> bool {
    let flat: Vec<f64> = chains.iter().flatten().copied().collect();
    math::max(&flat) - math::min(&flat) < RESOLUTION
}

/// Split every chain into its first and last halves (the middle draw of an
/// odd-length chain is dropped).
pub fn split_chains(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut out = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let half = chain.len() / 2;
        out.push(chain[..half].to_vec());
        out.push(chain[chain.len() - half..].to_vec());
    }
    out
}

/// Replace draws by normal scores of their pooled average ranks.
pub fn z_scale(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let flat: Vec<f64> = chains.iter().flatten().copied().collect();
    let ranks = math::average_ranks(&flat);
    let size = flat.len() as f64;
    // Infallible for mean 0, sd 1.
    let normal = Normal::standard();

    let mut scores = ranks.iter().map(|r| normal.inverse_cdf((r - 0.375) / (size + 0.25)));
    chains
        .iter()
        .map(|c| scores.by_ref().take(c.len()).collect())
        .collect()
}

/// Classic between/within R-hat.
fn rhat_basic(chains: &[Vec<f64>]) -> f64 {
    let n = chains[0].len() as f64;
    let chain_means: Vec<f64> = chains.iter().map(|c| math::mean(c)).collect();
    let chain_vars: Vec<f64> = chains.iter().map(|c| math::sample_variance(c)).collect();
    let between = n * math::sample_variance(&chain_means);
    let within = math::mean(&chain_vars);
    ((between / within + n - 1.0) / n).sqrt()
}

/// Rank-normalized split R-hat: the larger of the bulk and folded (tail) versions.
pub fn rhat(chains: &[Vec<f64>]) -> f64 {
    if is_degenerate(chains) {
        return f64::NAN;
    }
    if is_constant(chains) {
        return 1.0;
    }
    let split = split_chains(chains);
    let bulk = rhat_basic(&z_scale(&split));

    let pooled: Vec<f64> = split.iter().flatten().copied().collect();
    let median = math::median(&pooled);
    let folded: Vec<Vec<f64>> = split
        .iter()
        .map(|c| c.iter().map(|x| (x - median).abs()).collect())
        .collect();
    let tail = rhat_basic(&z_scale(&folded));

    bulk.max(tail)
}

/// Biased autocovariance of `x` at `lag`.
fn autocov(x: &[f64], mean: f64, lag: usize) -> f64 {
    let n = x.len();
    let s: f64 = (0..n - lag).map(|t| (x[t] - mean) * (x[t + lag] - mean)).sum();
    s / n as f64
}

/// Multi-chain ESS with Geyer's initial positive and monotone sequences.
fn ess_raw(chains: &[Vec<f64>]) -> f64 {
    let size = total(chains);
    if is_constant(chains) {
        return size as f64;
    }
    let m = chains.len();
    let n = chains[0].len();
    let nf = n as f64;
    let chain_means: Vec<f64> = chains.iter().map(|c| math::mean(c)).collect();

    // Mean over chains of the autocovariance at `lag`.
    let mean_acov = |lag: usize| -> f64 {
        chains
            .iter()
            .zip(&chain_means)
            .map(|(c, &mu)| autocov(c, mu, lag))
            .sum::<f64>()
            / m as f64
    };

    let acov0 = mean_acov(0);
    let mean_var = acov0 * nf / (nf - 1.0);
    let mut var_plus = mean_var * (nf - 1.0) / nf;
    if m > 1 {
        var_plus += math::sample_variance(&chain_means);
    }

    let mut rho = vec![0.0; n];
    let mut rho_even = 1.0;
    rho[0] = rho_even;
    let mut rho_odd = 1.0 - (mean_var - mean_acov(1)) / var_plus;
    rho[1] = rho_odd;

    // Initial positive sequence.
    let mut t: isize = 1;
    while t < n as isize - 3 && rho_even + rho_odd > 0.0 {
        let tu = t as usize;
        rho_even = 1.0 - (mean_var - mean_acov(tu + 1)) / var_plus;
        rho_odd = 1.0 - (mean_var - mean_acov(tu + 2)) / var_plus;
        if rho_even + rho_odd >= 0.0 {
            rho[tu + 1] = rho_even;
            rho[tu + 2] = rho_odd;
        }
        t += 2;
    }
    let max_t = t - 2;
    if rho_even > 0.0 {
        rho[(max_t + 1) as usize] = rho_even;
    }

    // Initial monotone sequence.
    let mut t: isize = 1;
    while t <= max_t - 2 {
        let tu = t as usize;
        if rho[tu + 1] + rho[tu + 2] > rho[tu - 1] + rho[tu] {
            rho[tu + 1] = (rho[tu - 1] + rho[tu]) / 2.0;
            rho[tu + 2] = rho[tu + 1];
        }
        t += 2;
    }

    let head = (max_t + 1) as usize;
    let ess = size as f64;
    let mut tau_hat = -1.0 + 2.0 * rho[..head].iter().sum::<f64>() + rho[head];
    tau_hat = tau_hat.max(1.0 / ess.log10());
    if rho.iter().any(|r| r.is_nan()) {
        return f64::NAN;
    }
    ess / tau_hat
}

/// Bulk ESS: ESS of the rank-normalized split chains.
pub fn ess_bulk(chains: &[Vec<f64>]) -> f64 {
    if is_degenerate(chains) {
        return f64::NAN;
    }
    if is_constant(chains) {
        return total(chains) as f64;
    }
    ess_raw(&z_scale(&split_chains(chains)))
}

/// Tail ESS: the smaller ESS of the 5% and 95% quantile indicators.
pub fn ess_tail(chains: &[Vec<f64>]) -> f64 {
    if is_degenerate(chains) {
        return f64::NAN;
    }
    if is_constant(chains) {
        return total(chains) as f64;
    }
    let flat: Vec<f64> = chains.iter().flatten().copied().collect();
    let sorted = math::sorted(&flat);

    let indicator_ess = |q: f64| -> f64 {
        let cut = math::quantile_sorted(&sorted, q);
        let ind: Vec<Vec<f64>> = chains
            .iter()
            .map(|c| c.iter().map(|&x| if x <= cut { 1.0 } else { 0.0 }).collect())
            .collect();
        ess_raw(&split_chains(&ind))
    };
    indicator_ess(0.05).min(indicator_ess(0.95))
}
