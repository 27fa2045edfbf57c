//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the model, diagnostics and analysis layers
//! - exported to JSON for the reporting/serving collaborators
//! - rebuilt in tests without running a sampler

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math;

/// Change-point index parameter.
pub const TAU: &str = "tau";
/// Mean of the regime before the change point.
pub const MU_1: &str = "mu_1";
/// Mean of the regime after the change point.
pub const MU_2: &str = "mu_2";
/// Scale of the regime before the change point.
pub const SIGMA_1: &str = "sigma_1";
/// Scale of the regime after the change point.
pub const SIGMA_2: &str = "sigma_2";

/// All model parameters in canonical order.
pub const PARAM_NAMES: [&str; 5] = [TAU, MU_1, MU_2, SIGMA_1, SIGMA_2];

/// Date formats accepted by the CSV ingest and the event table.
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%b-%y", "%m/%d/%Y"];

/// Parse a date using the first matching format in [`DATE_FORMATS`].
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// An ordered univariate series with optional index-aligned dates.
///
/// Invariants (checked at construction):
/// - at least one value, all finite
/// - when present, `timestamps.len() == values.len()` and dates strictly increase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct Series {
    name: String,
    values: Vec<f64>,
    timestamps: Option<Vec<NaiveDate>>,
}

#[derive(Deserialize)]
struct RawSeries {
    name: String,
    values: Vec<f64>,
    timestamps: Option<Vec<NaiveDate>>,
}

impl TryFrom<RawSeries> for Series {
    type Error = AppError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        let series = match raw.timestamps {
            Some(timestamps) => Series::with_timestamps(raw.values, timestamps)?,
            None => Series::new(raw.values)?,
        };
        Ok(series.named(raw.name))
    }
}

impl Series {
    pub fn new(values: Vec<f64>) -> Result<Self, AppError> {
        validate_values(&values)?;
        Ok(Self {
            name: "series".to_string(),
            values,
            timestamps: None,
        })
    }

    pub fn with_timestamps(values: Vec<f64>, timestamps: Vec<NaiveDate>) -> Result<Self, AppError> {
        validate_values(&values)?;
        if timestamps.len() != values.len() {
            return Err(AppError::validation(format!(
                "Timestamps length ({}) does not match values length ({}).",
                timestamps.len(),
                values.len()
            )));
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(AppError::validation(format!(
                "Timestamps must be strictly increasing (violated at index {}: {} -> {}).",
                i + 1,
                timestamps[i],
                timestamps[i + 1]
            )));
        }
        Ok(Self {
            name: "series".to_string(),
            values,
            timestamps: Some(timestamps),
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> Option<&[NaiveDate]> {
        self.timestamps.as_deref()
    }

    /// Date at `index`, if the series carries timestamps and the index is in range.
    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        self.timestamps.as_ref().and_then(|ts| ts.get(index).copied())
    }

    pub fn mean(&self) -> f64 {
        math::mean(&self.values)
    }

    /// Population standard deviation.
    pub fn std(&self) -> f64 {
        math::std(&self.values)
    }

    /// Log returns `ln(v_t / v_{t-1})`; the first timestamp is dropped.
    pub fn log_returns(&self) -> Result<Series, AppError> {
        if self.values.len() < 2 {
            return Err(AppError::validation("Log returns need at least two observations."));
        }
        if let Some(i) = self.values.iter().position(|v| *v <= 0.0) {
            return Err(AppError::validation(format!(
                "Log returns need strictly positive values (index {i} is {}).",
                self.values[i]
            )));
        }
        let values: Vec<f64> = self.values.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let out = match &self.timestamps {
            Some(ts) => Series::with_timestamps(values, ts[1..].to_vec())?,
            None => Series::new(values)?,
        };
        Ok(out.named(format!("{}_log_returns", self.name)))
    }

    pub fn summary(&self) -> SeriesSummary {
        SeriesSummary {
            count: self.values.len(),
            mean: self.mean(),
            median: math::median(&self.values),
            std: self.std(),
            min: math::min(&self.values),
            max: math::max(&self.values),
            date_range: self
                .timestamps
                .as_ref()
                .and_then(|ts| Some((*ts.first()?, *ts.last()?))),
        }
    }
}

fn validate_values(values: &[f64]) -> Result<(), AppError> {
    if values.is_empty() {
        return Err(AppError::validation("Series cannot be empty."));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(AppError::validation(format!(
            "Series contains a missing or non-finite value at index {i}; clean the data first."
        )));
    }
    Ok(())
}

/// Descriptive statistics of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Prior and segment configuration for the change-point model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Multiplier on the series std for the prior scales of μ and σ.
    pub prior_std_scale: f64,
    /// Minimum number of observations on each side of τ.
    pub min_segment_length: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            prior_std_scale: 2.0,
            min_segment_length: 30,
        }
    }
}

impl ModelConfig {
    /// Check the configuration against a series of `n` observations.
    pub fn validate(&self, n: usize) -> Result<(), AppError> {
        if !(self.prior_std_scale.is_finite() && self.prior_std_scale > 0.0) {
            return Err(AppError::validation(format!(
                "prior_std_scale must be finite and > 0 (got {}).",
                self.prior_std_scale
            )));
        }
        if self.min_segment_length == 0 {
            return Err(AppError::validation("min_segment_length must be >= 1."));
        }
        if self.min_segment_length.saturating_mul(2) >= n {
            return Err(AppError::validation(format!(
                "min_segment_length ({}) is too large: series has {n} observations, need more than {}.",
                self.min_segment_length,
                self.min_segment_length.saturating_mul(2)
            )));
        }
        Ok(())
    }
}

/// MCMC run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Retained draws per chain.
    pub samples: usize,
    /// Warm-up draws per chain (discarded, used for adaptation).
    pub tune: usize,
    pub chains: usize,
    /// Target acceptance probability for the gradient-based step.
    pub target_accept: f64,
    /// Base seed; `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples: 2000,
            tune: 1000,
            chains: 2,
            target_accept: 0.95,
            seed: None,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.samples == 0 {
            return Err(AppError::validation("samples must be >= 1."));
        }
        if self.chains == 0 {
            return Err(AppError::validation("chains must be >= 1."));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(AppError::validation(format!(
                "target_accept must be in (0, 1) (got {}).",
                self.target_accept
            )));
        }
        Ok(())
    }
}

/// Convergence gate thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceThresholds {
    pub rhat: f64,
    pub ess_bulk: f64,
    pub ess_tail: f64,
}

impl Default for ConvergenceThresholds {
    fn default() -> Self {
        Self {
            rhat: 1.01,
            ess_bulk: 100.0,
            ess_tail: 100.0,
        }
    }
}

/// Point-estimate method for τ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EstimateMethod {
    Mean,
    Median,
    Mode,
}

impl EstimateMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            EstimateMethod::Mean => "mean",
            EstimateMethod::Median => "median",
            EstimateMethod::Mode => "mode",
        }
    }
}

impl fmt::Display for EstimateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimateMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(EstimateMethod::Mean),
            "median" => Ok(EstimateMethod::Median),
            "mode" => Ok(EstimateMethod::Mode),
            other => Err(AppError::validation(format!(
                "Method '{other}' not recognized. Choose from: 'mean', 'median', 'mode'."
            ))),
        }
    }
}

/// Direction of the mean shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    Minimal,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Increase => "increase",
            Direction::Decrease => "decrease",
            Direction::Minimal => "minimal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size of the mean shift in units of the series standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Magnitude {
    #[serde(rename = "negligible")]
    Negligible,
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "large")]
    Large,
    #[serde(rename = "very large")]
    VeryLarge,
}

impl Magnitude {
    /// Classify `|mean_change| / std(series)`.
    pub fn from_std_units(x: f64) -> Self {
        if x < 0.2 {
            Magnitude::Negligible
        } else if x < 0.5 {
            Magnitude::Small
        } else if x < 1.0 {
            Magnitude::Moderate
        } else if x < 2.0 {
            Magnitude::Large
        } else {
            Magnitude::VeryLarge
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Magnitude::Negligible => "negligible",
            Magnitude::Small => "small",
            Magnitude::Moderate => "moderate",
            Magnitude::Large => "large",
            Magnitude::VeryLarge => "very large",
        }
    }

    pub fn is_strong(self) -> bool {
        matches!(self, Magnitude::Large | Magnitude::VeryLarge)
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign of the scale shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityDirection {
    Increase,
    Decrease,
}

impl VolatilityDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            VolatilityDirection::Increase => "increase",
            VolatilityDirection::Decrease => "decrease",
        }
    }
}

/// Located change point with its credible interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointRecord {
    pub index: usize,
    pub date: Option<NaiveDate>,
    pub estimate_method: EstimateMethod,
    /// HDI over τ, widened outward to whole indices.
    pub credible_interval: (usize, usize),
    pub ci_dates: Option<(NaiveDate, NaiveDate)>,
    pub ci_probability: f64,
    pub posterior_std: f64,
    pub posterior_samples: usize,
}

/// Before/after regime statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub mu_before: f64,
    pub mu_after: f64,
    pub mu_before_ci: (f64, f64),
    pub mu_after_ci: (f64, f64),
    pub mean_change: f64,
    /// `None` when `mu_before` is (numerically) zero.
    pub mean_change_pct: Option<f64>,
    pub direction: Direction,
    pub magnitude: Magnitude,
    pub magnitude_in_std: f64,
    pub volatility: Option<VolatilityImpact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityImpact {
    pub sigma_before: f64,
    pub sigma_after: f64,
    pub sigma_before_ci: (f64, f64),
    pub sigma_after_ci: (f64, f64),
    pub sigma_change: f64,
    pub sigma_change_pct: Option<f64>,
    pub volatility_direction: VolatilityDirection,
}

/// A known external event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub date: NaiveDate,
    pub name: String,
    pub event_type: String,
    pub description: Option<String>,
    pub expected_impact: Option<String>,
}

/// An event found inside an association window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyEvent {
    pub event: Event,
    /// `event_date - changepoint_date` in days.
    pub days_from_changepoint: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAssociation {
    pub changepoint_date: NaiveDate,
    pub changepoint_index: usize,
    pub window_days: i64,
    /// Sorted by absolute distance, closest first.
    pub associated_events: Vec<NearbyEvent>,
    pub closest_event: Option<NearbyEvent>,
    pub days_from_closest: Option<i64>,
    pub num_events_in_window: usize,
}

/// Raw-series impact around a single event date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventWindowImpact {
    Measured {
        event_date: NaiveDate,
        window_days: i64,
        n_before: usize,
        n_after: usize,
        mean_before: f64,
        mean_after: f64,
        change: f64,
        change_pct: Option<f64>,
        std_before: Option<f64>,
        std_after: Option<f64>,
    },
    /// One side of the window holds no observations.
    InsufficientData {
        event_date: NaiveDate,
        window_days: i64,
        n_before: usize,
        n_after: usize,
    },
}

/// Knobs for the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// HDI probability for τ and the regime parameters.
    pub confidence: f64,
    pub method: EstimateMethod,
    pub window_days: i64,
    pub include_volatility: bool,
    /// Column of the event table holding event dates.
    pub date_column: String,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            confidence: 0.94,
            method: EstimateMethod::Mean,
            window_days: 30,
            include_volatility: true,
            date_column: "date".to_string(),
        }
    }
}

/// A full `cpd detect` run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub value_column: String,
    pub date_column: String,
    /// Model log returns of the input instead of raw levels.
    pub log_returns: bool,
    pub events: Option<PathBuf>,

    pub model: ModelConfig,
    pub sampler: SamplerConfig,
    pub thresholds: ConvergenceThresholds,
    pub analysis: AnalysisOptions,

    /// Fail the run when the convergence gate does not pass.
    pub strict: bool,
    pub export: Option<PathBuf>,
    pub export_trace: Option<PathBuf>,
}
