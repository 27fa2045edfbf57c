//! Hybrid Gibbs/HMC sampler for the single change-point model.
//!
//! Each iteration of a chain does two updates:
//!
//! 1. draw τ exactly from its full conditional, enumerating every admissible
//!    index (`O(N)` thanks to prefix sums)
//! 2. one HMC transition of `q = [μ1, μ2, ln σ1, ln σ2]` given τ
//!
//! Warm-up adapts the HMC step size by dual averaging toward
//! `target_accept` and fits a diagonal mass matrix over a series of doubling
//! windows. Warm-up draws are discarded.
//!
//! Chains are independent and run in parallel. Chain `c` is seeded from
//! `hash(seed, c)`, and results are gathered in chain order, so a fixed seed
//! and chain count give identical traces regardless of scheduling.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::{debug, info, warn};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::domain::{MU_1, MU_2, SIGMA_1, SIGMA_2, SamplerConfig, TAU};
use crate::error::AppError;
use crate::fit::hmc::{DualAveraging, LogDensity, VarianceEstimator, find_reasonable_step_size, transition};
use crate::fit::trace::{ChainStats, PosteriorTrace};
use crate::math;
use crate::models::likelihood::{ConditionalPosterior, RegimeParams};
use crate::models::RegimeModel;

/// Nominal integration time of one HMC trajectory.
const PATH_LENGTH: f64 = 1.5;
/// Cap on leapfrog steps per transition.
const MAX_LEAPFROG_STEPS: usize = 128;
/// Fractions of warm-up reserved before/after mass-matrix windows.
const INIT_BUFFER: f64 = 0.15;
const TERM_BUFFER: f64 = 0.10;
const BASE_WINDOW: usize = 25;

/// Draws (on the raw scale) and statistics from one chain.
#[derive(Debug, Clone)]
struct ChainOutput {
    tau: Vec<f64>,
    mu_1: Vec<f64>,
    mu_2: Vec<f64>,
    sigma_1: Vec<f64>,
    sigma_2: Vec<f64>,
    stats: ChainStats,
}

/// Run every chain and assemble the posterior trace.
pub fn sample(model: &RegimeModel, config: &SamplerConfig) -> Result<PosteriorTrace, AppError> {
    config.validate()?;
    let base_seed = config.seed.unwrap_or_else(rand::random);
    let (tau_min, tau_max) = model.tau_bounds();
    info!(
        "Sampling {} chain(s): {} tune + {} draws each, tau in [{tau_min}, {tau_max}], seed {base_seed}",
        config.chains, config.tune, config.samples
    );

    let outputs: Vec<ChainOutput> = (0..config.chains)
        .into_par_iter()
        .map(|chain| run_chain(model, config, chain, chain_seed(base_seed, chain)))
        .collect::<Result<Vec<_>, AppError>>()?;

    let divergences: usize = outputs.iter().map(|o| o.stats.divergences).sum();
    if divergences > 0 {
        warn!("{divergences} divergent transition(s) after tuning; consider a higher target_accept.");
    }

    let mut tau = Vec::with_capacity(outputs.len());
    let mut mu_1 = Vec::with_capacity(outputs.len());
    let mut mu_2 = Vec::with_capacity(outputs.len());
    let mut sigma_1 = Vec::with_capacity(outputs.len());
    let mut sigma_2 = Vec::with_capacity(outputs.len());
    let mut stats = Vec::with_capacity(outputs.len());
    for out in outputs {
        tau.push(out.tau);
        mu_1.push(out.mu_1);
        mu_2.push(out.mu_2);
        sigma_1.push(out.sigma_1);
        sigma_2.push(out.sigma_2);
        stats.push(out.stats);
    }

    let trace = PosteriorTrace::from_chains(vec![
        (TAU, tau),
        (MU_1, mu_1),
        (MU_2, mu_2),
        (SIGMA_1, sigma_1),
        (SIGMA_2, sigma_2),
    ])?;
    Ok(trace.with_sampler_stats(stats))
}

/// Deterministic per-chain seed.
pub fn chain_seed(base_seed: u64, chain: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    base_seed.hash(&mut hasher);
    chain.hash(&mut hasher);
    hasher.finish()
}

/// End iterations (exclusive) of the mass-matrix adaptation windows.
///
/// Windows start after the initial buffer, double in size, and the last one
/// is stretched to meet the terminal buffer. Short warm-ups get no windows.
fn mass_windows(tune: usize) -> Vec<usize> {
    if tune < 20 {
        return Vec::new();
    }
    let start_at = (tune as f64 * INIT_BUFFER) as usize;
    let end = tune - (tune as f64 * TERM_BUFFER) as usize;
    let mut ends = Vec::new();
    let mut start = start_at;
    let mut size = BASE_WINDOW.min(end - start);
    while start < end {
        let mut stop = start + size;
        if stop + 2 * size > end {
            stop = end;
        }
        ends.push(stop);
        start = stop;
        size *= 2;
    }
    ends
}

/// Exact draw of τ from its full conditional.
fn draw_tau<R: Rng + ?Sized>(model: &RegimeModel, q: &[f64], rng: &mut R) -> Result<usize, AppError> {
    let (tau_min, tau_max) = model.tau_bounds();
    let params = RegimeParams::from_unconstrained(q);
    let weights = model.data().tau_log_weights(tau_min, tau_max, &params);
    let norm = math::log_sum_exp(&weights);
    if !norm.is_finite() {
        return Err(AppError::numerical(format!(
            "Change-point conditional is not normalisable (log normaliser {norm}) at {params:?}."
        )));
    }

    let u: f64 = rng.r#gen();
    let mut cumulative = 0.0;
    for (offset, w) in weights.iter().enumerate() {
        cumulative += (w - norm).exp();
        if u < cumulative {
            return Ok(tau_min + offset);
        }
    }
    // Rounding can leave the cumulative mass a hair below one.
    Ok(tau_max)
}

fn leapfrog_steps<R: Rng + ?Sized>(step_size: f64, rng: &mut R) -> usize {
    let jitter = rng.gen_range(0.8..1.2);
    ((PATH_LENGTH * jitter / step_size).ceil() as usize).clamp(1, MAX_LEAPFROG_STEPS)
}

fn run_chain(model: &RegimeModel, config: &SamplerConfig, chain: usize, seed: u64) -> Result<ChainOutput, AppError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (tau_min, tau_max) = model.tau_bounds();
    let prior_scale = model.prior_scale();
    let center = model.data().center();
    let scale = model.data().scale();

    let mut q: Vec<f64> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut tau = rng.gen_range(tau_min..=tau_max);

    let mut scratch = vec![0.0; 4];
    let target = ConditionalPosterior { data: model.data(), tau, prior_scale };
    if !target.log_density_and_gradient(&q, &mut scratch).is_finite() {
        return Err(AppError::numerical(format!("Chain {chain}: non-finite log density at the initial point.")));
    }

    let mut inv_mass = vec![1.0; 4];
    let mut step_size = find_reasonable_step_size(&target, &q, &inv_mass, 1.0, &mut rng);
    let mut dual = DualAveraging::new(step_size, config.target_accept);
    let windows = mass_windows(config.tune);
    let window_start = (config.tune as f64 * INIT_BUFFER) as usize;
    let mut window_idx = 0;
    let mut variance = VarianceEstimator::new(4);

    let n = config.samples;
    let mut out = ChainOutput {
        tau: Vec::with_capacity(n),
        mu_1: Vec::with_capacity(n),
        mu_2: Vec::with_capacity(n),
        sigma_1: Vec::with_capacity(n),
        sigma_2: Vec::with_capacity(n),
        stats: ChainStats {
            chain,
            seed,
            step_size,
            acceptance_rate: 0.0,
            divergences: 0,
            tune: config.tune,
            draws: n,
        },
    };
    let mut accept_sum = 0.0;

    for iter in 0..config.tune + config.samples {
        let warmup = iter < config.tune;

        tau = draw_tau(model, &q, &mut rng)?;
        let target = ConditionalPosterior { data: model.data(), tau, prior_scale };
        let eps = if warmup { dual.current() } else { step_size };
        let n_steps = leapfrog_steps(eps, &mut rng);
        let t = transition(&target, &q, eps, &inv_mass, n_steps, &mut rng);
        q = t.position;

        if warmup {
            dual.update(t.accept_prob);

            if window_idx < windows.len() && iter >= window_start {
                variance.add(&q);
                if iter + 1 == windows[window_idx] {
                    // A window needs two points for a variance; otherwise keep the old metric.
                    if variance.count() > 1 {
                        inv_mass = variance.regularized_variance();
                    }
                    variance = VarianceEstimator::new(4);
                    window_idx += 1;
                    let restart = find_reasonable_step_size(&target, &q, &inv_mass, dual.current(), &mut rng);
                    dual.restart(restart);
                    debug!(
                        "chain {chain}: mass window {window_idx} closed at iteration {}; inv_mass={inv_mass:?}, step={restart:.4}",
                        iter + 1
                    );
                }
            }

            if iter + 1 == config.tune {
                step_size = dual.adapted();
                debug!("chain {chain}: tuned step size {step_size:.4}");
            }
            continue;
        }

        accept_sum += t.accept_prob;
        if t.divergent {
            out.stats.divergences += 1;
        }
        let params = RegimeParams::from_unconstrained(&q);
        out.tau.push(tau as f64);
        out.mu_1.push(center + scale * params.mu_1);
        out.mu_2.push(center + scale * params.mu_2);
        out.sigma_1.push(scale * params.sigma_1);
        out.sigma_2.push(scale * params.sigma_2);
    }

    out.stats.step_size = step_size;
    out.stats.acceptance_rate = accept_sum / n as f64;
    debug!(
        "chain {chain} done: acceptance {:.3}, divergences {}",
        out.stats.acceptance_rate, out.stats.divergences
    );
    Ok(out)
}
