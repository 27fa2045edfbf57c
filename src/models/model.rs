//! Single change-point model and its build/fit lifecycle.
//!
//! ```text
//! τ        ~ DiscreteUniform(L, N − L − 1)
//! μ1, μ2   ~ Normal(mean(y), c·std(y))
//! σ1, σ2   ~ HalfNormal(c·std(y))
//! y_t      ~ Normal(μ1, σ1) if t < τ else Normal(μ2, σ2)
//! ```
//!
//! `ChangePointModel` moves through `Unbuilt → Built → Fitted`. Calling an
//! operation out of order is a `State` error; rebuilding drops any fit.

use std::fmt;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostics, Hdi, ParameterSummary};
use crate::domain::{EstimateMethod, ModelConfig, PARAM_NAMES, SamplerConfig, Series};
use crate::error::AppError;
use crate::fit::{self, PosteriorTrace};
use crate::models::likelihood::StandardizedData;

/// HDI probability used by [`ChangePointModel::parameter_estimates`].
pub const DEFAULT_HDI_PROB: f64 = 0.94;

/// A built model: validated configuration plus the standardized data.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeModel {
    config: ModelConfig,
    data: StandardizedData,
    tau_min: usize,
    tau_max: usize,
}

impl RegimeModel {
    pub fn new(series: &Series, config: ModelConfig) -> Result<Self, AppError> {
        let n = series.len();
        config.validate(n)?;
        let std = series.std();
        if std <= 0.0 {
            return Err(AppError::validation(
                "Series has zero variance; a change point is not identifiable.",
            ));
        }
        Ok(Self {
            config,
            data: StandardizedData::new(series.values(), series.mean(), std),
            tau_min: config.min_segment_length,
            tau_max: n - config.min_segment_length - 1,
        })
    }

    pub fn data(&self) -> &StandardizedData {
        &self.data
    }

    /// Inclusive support of τ.
    pub fn tau_bounds(&self) -> (usize, usize) {
        (self.tau_min, self.tau_max)
    }

    /// Prior scale of μ' and σ' on the standardized axis.
    pub fn prior_scale(&self) -> f64 {
        self.config.prior_std_scale
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Unbuilt,
    Built(RegimeModel),
    Fitted(RegimeModel, PosteriorTrace),
}

/// Point estimate of τ together with how it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePointEstimate {
    pub index: usize,
    pub method: EstimateMethod,
    /// Series date at `index`, when the series is dated.
    pub date: Option<NaiveDate>,
}

/// Posterior mean, sd and HDI of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEstimate {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub hdi: Hdi,
}

#[derive(Debug, Clone)]
pub struct ChangePointModel {
    series: Series,
    phase: Phase,
}

impl ChangePointModel {
    pub fn new(series: Series) -> Self {
        Self {
            series,
            phase: Phase::Unbuilt,
        }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn is_built(&self) -> bool {
        !matches!(self.phase, Phase::Unbuilt)
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.phase, Phase::Fitted(..))
    }

    /// Validate `config` against the series and set up priors.
    pub fn build(&mut self, config: ModelConfig) -> Result<&RegimeModel, AppError> {
        let model = RegimeModel::new(&self.series, config)?;
        let (lo, hi) = model.tau_bounds();
        info!(
            "Built change-point model on {} observations (tau in [{lo}, {hi}], prior scale {})",
            self.series.len(),
            config.prior_std_scale
        );
        self.phase = Phase::Built(model);
        self.regime_model()
    }

    fn regime_model(&self) -> Result<&RegimeModel, AppError> {
        match &self.phase {
            Phase::Unbuilt => Err(AppError::state("Model must be built before fitting. Call build() first.")),
            Phase::Built(model) | Phase::Fitted(model, _) => Ok(model),
        }
    }

    /// Sample the posterior. Refitting replaces the previous trace.
    pub fn fit(&mut self, config: &SamplerConfig) -> Result<&PosteriorTrace, AppError> {
        let model = self.regime_model()?.clone();
        let trace = fit::sample(&model, config)?;
        self.phase = Phase::Fitted(model, trace);
        self.trace()
    }

    pub fn trace(&self) -> Result<&PosteriorTrace, AppError> {
        match &self.phase {
            Phase::Fitted(_, trace) => Ok(trace),
            _ => Err(AppError::state("Model must be fitted first. Call fit() before reading the trace.")),
        }
    }

    /// Point estimate of the change-point index and its date.
    pub fn changepoint_estimate(&self, method: EstimateMethod) -> Result<ChangePointEstimate, AppError> {
        let estimate = self.trace()?.point_estimate(crate::domain::TAU, method)?;
        let index = usize::try_from(estimate)
            .map_err(|_| AppError::numerical(format!("Change-point estimate {estimate} is negative.")))?;
        Ok(ChangePointEstimate {
            index,
            method,
            date: self.series.date_at(index),
        })
    }

    /// Posterior table for every model parameter.
    pub fn summary(&self, hdi_prob: f64) -> Result<Vec<ParameterSummary>, AppError> {
        Diagnostics::new(self.trace()?).summary(&PARAM_NAMES, hdi_prob)
    }

    pub fn parameter_estimates(&self) -> Result<Vec<ParameterEstimate>, AppError> {
        let trace = self.trace()?;
        let diag = Diagnostics::new(trace);
        PARAM_NAMES
            .iter()
            .map(|name| {
                Ok(ParameterEstimate {
                    name: name.to_string(),
                    mean: trace.mean(name)?,
                    sd: trace.std(name)?,
                    hdi: diag.hdi(name, DEFAULT_HDI_PROB)?,
                })
            })
            .collect()
    }
}

impl fmt::Display for ChangePointModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.phase {
            Phase::Unbuilt => "not built".to_string(),
            Phase::Built(_) => "built, not fitted".to_string(),
            Phase::Fitted(_, trace) => format!("fitted ({} chains x {} draws)", trace.n_chains(), trace.n_draws()),
        };
        write!(f, "ChangePointModel(n_obs={}, status={status})", self.series.len())
    }
}
