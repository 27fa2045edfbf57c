//! Regime-switching Gaussian likelihood and priors.
//!
//! The sampler works on the series standardized by its own mean and
//! (population) standard deviation:
//!
//! ```text
//! z_t = (y_t - mean) / std
//! μ'  = (μ - mean) / std   ~ Normal(0, c)
//! σ'  = σ / std            ~ HalfNormal(c)        c = prior_std_scale
//! ```
//!
//! This is an exact affine reparameterization of the model on the raw scale, so
//! draws are mapped back with `μ = mean + std·μ'` and `σ = std·σ'`.
//!
//! Each regime only needs `(n, Σz, Σz²)` over its index range, which we read
//! from prefix sums. That makes a full sweep over every candidate τ `O(N)`.

use std::f64::consts::PI;

use crate::fit::hmc::LogDensity;

const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// Sufficient statistics of one contiguous segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    pub n: f64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl SegmentStats {
    /// `Σ (z - mu)^2` over the segment.
    pub fn squared_deviation(&self, mu: f64) -> f64 {
        (self.sum_sq - 2.0 * mu * self.sum + self.n * mu * mu).max(0.0)
    }

    /// Gaussian log-likelihood of the segment under `Normal(mu, sigma)`.
    pub fn log_likelihood(&self, mu: f64, sigma: f64) -> f64 {
        -self.n * (sigma.ln() + HALF_LN_2PI) - 0.5 * self.squared_deviation(mu) / (sigma * sigma)
    }
}

/// Standardized observations with prefix sums.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedData {
    center: f64,
    scale: f64,
    prefix_sum: Vec<f64>,
    prefix_sq: Vec<f64>,
}

impl StandardizedData {
    /// `scale` must be strictly positive.
    pub fn new(values: &[f64], center: f64, scale: f64) -> Self {
        let mut prefix_sum = Vec::with_capacity(values.len() + 1);
        let mut prefix_sq = Vec::with_capacity(values.len() + 1);
        prefix_sum.push(0.0);
        prefix_sq.push(0.0);
        let (mut s, mut s2) = (0.0, 0.0);
        for &v in values {
            let z = (v - center) / scale;
            s += z;
            s2 += z * z;
            prefix_sum.push(s);
            prefix_sq.push(s2);
        }
        Self {
            center,
            scale,
            prefix_sum,
            prefix_sq,
        }
    }

    fn len(&self) -> usize {
        self.prefix_sum.len() - 1
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Statistics of indices `start..end`.
    pub fn segment(&self, start: usize, end: usize) -> SegmentStats {
        SegmentStats {
            n: (end - start) as f64,
            sum: self.prefix_sum[end] - self.prefix_sum[start],
            sum_sq: self.prefix_sq[end] - self.prefix_sq[start],
        }
    }

    /// Log-likelihood of the whole series for change point `tau`
    /// (indices `< tau` use regime 1).
    pub fn regime_log_likelihood(&self, tau: usize, params: &RegimeParams) -> f64 {
        self.segment(0, tau).log_likelihood(params.mu_1, params.sigma_1)
            + self.segment(tau, self.len()).log_likelihood(params.mu_2, params.sigma_2)
    }

    /// Unnormalized log posterior weight of every τ in `tau_min..=tau_max`.
    ///
    /// The τ prior is uniform, so weights are the log-likelihoods.
    pub fn tau_log_weights(&self, tau_min: usize, tau_max: usize, params: &RegimeParams) -> Vec<f64> {
        (tau_min..=tau_max)
            .map(|tau| self.regime_log_likelihood(tau, params))
            .collect()
    }
}

/// Regime parameters on the standardized scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeParams {
    pub mu_1: f64,
    pub mu_2: f64,
    pub sigma_1: f64,
    pub sigma_2: f64,
}

impl RegimeParams {
    /// Decode the unconstrained vector `[μ1, μ2, ln σ1, ln σ2]`.
    pub fn from_unconstrained(q: &[f64]) -> Self {
        Self {
            mu_1: q[0],
            mu_2: q[1],
            sigma_1: q[2].exp(),
            sigma_2: q[3].exp(),
        }
    }
}

/// Log density of `Normal(0, scale)` at `x`.
pub fn normal_log_prior(x: f64, scale: f64) -> f64 {
    -0.5 * (x / scale).powi(2) - scale.ln() - HALF_LN_2PI
}

/// Log density of `HalfNormal(scale)` at `x > 0`.
pub fn half_normal_log_prior(x: f64, scale: f64) -> f64 {
    -0.5 * (x / scale).powi(2) - scale.ln() + (2.0 / PI).sqrt().ln()
}

/// Posterior of the continuous block given τ, in unconstrained coordinates
/// `q = [μ1, μ2, η1, η2]` with `σ = exp(η)` (Jacobian included).
#[derive(Debug, Clone, Copy)]
pub struct ConditionalPosterior<'a> {
    pub data: &'a StandardizedData,
    pub tau: usize,
    /// Prior scale `c` on the standardized axis.
    pub prior_scale: f64,
}

impl LogDensity for ConditionalPosterior<'_> {
    fn dim(&self) -> usize {
        4
    }

    fn log_density_and_gradient(&self, q: &[f64], grad: &mut [f64]) -> f64 {
        let before = self.data.segment(0, self.tau);
        let after = self.data.segment(self.tau, self.data.len());
        let c2 = self.prior_scale * self.prior_scale;

        let mut lp = 0.0;
        for (k, seg) in [before, after].iter().enumerate() {
            let mu = q[k];
            let eta = q[k + 2];
            let sigma = eta.exp();
            let s2 = sigma * sigma;
            let ss = seg.squared_deviation(mu);

            lp += seg.log_likelihood(mu, sigma);
            lp += normal_log_prior(mu, self.prior_scale);
            lp += half_normal_log_prior(sigma, self.prior_scale) + eta;

            grad[k] = (seg.sum - seg.n * mu) / s2 - mu / c2;
            grad[k + 2] = -seg.n + ss / s2 - s2 / c2 + 1.0;
        }
        lp
    }
}
