//! Posterior draws organised by variable and chain.

use serde::{Deserialize, Serialize};

use crate::domain::EstimateMethod;
use crate::error::AppError;
use crate::math;

/// Draws of one variable: `draws[chain][draw]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceVariable {
    pub name: String,
    pub draws: Vec<Vec<f64>>,
}

/// Per-chain sampler statistics recorded after warm-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStats {
    pub chain: usize,
    pub seed: u64,
    /// Step size frozen at the end of warm-up.
    pub step_size: f64,
    /// Mean HMC acceptance probability over retained draws.
    pub acceptance_rate: f64,
    pub divergences: usize,
    pub tune: usize,
    pub draws: usize,
}

/// Retained draws of every model variable.
///
/// Invariants (checked at construction):
/// - every variable has the same number of chains and draws per chain
/// - variable names are unique
/// - all draws are finite
///
/// Deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrace")]
pub struct PosteriorTrace {
    n_chains: usize,
    n_draws: usize,
    variables: Vec<TraceVariable>,
    sampler_stats: Vec<ChainStats>,
}

/// Serialized layout of [`PosteriorTrace`], before validation.
#[derive(Deserialize)]
struct RawTrace {
    n_chains: usize,
    n_draws: usize,
    variables: Vec<TraceVariable>,
    #[serde(default)]
    sampler_stats: Vec<ChainStats>,
}

impl TryFrom<RawTrace> for PosteriorTrace {
    type Error = AppError;

    fn try_from(raw: RawTrace) -> Result<Self, Self::Error> {
        let trace = PosteriorTrace::from_chains(raw.variables.into_iter().map(|v| (v.name, v.draws)).collect())?;
        if (trace.n_chains, trace.n_draws) != (raw.n_chains, raw.n_draws) && !trace.variables.is_empty() {
            return Err(AppError::validation(format!(
                "Trace header says {} chains of {} draws, data has {} chains of {}.",
                raw.n_chains, raw.n_draws, trace.n_chains, trace.n_draws
            )));
        }
        if !raw.sampler_stats.is_empty() && raw.sampler_stats.len() != trace.n_chains {
            return Err(AppError::validation(format!(
                "Trace has {} chains but {} sampler stat entries.",
                trace.n_chains,
                raw.sampler_stats.len()
            )));
        }
        Ok(trace.with_sampler_stats(raw.sampler_stats))
    }
}

impl PosteriorTrace {
    /// Build a trace from `(name, draws[chain][draw])` pairs.
    pub fn from_chains<S: Into<String>>(variables: Vec<(S, Vec<Vec<f64>>)>) -> Result<Self, AppError> {
        let variables: Vec<TraceVariable> = variables
            .into_iter()
            .map(|(name, draws)| TraceVariable { name: name.into(), draws })
            .collect();

        let (n_chains, n_draws) = match variables.first() {
            Some(v) => (v.draws.len(), v.draws.first().map_or(0, Vec::len)),
            None => (0, 0),
        };

        for (i, var) in variables.iter().enumerate() {
            if variables[..i].iter().any(|v| v.name == var.name) {
                return Err(AppError::validation(format!("Duplicate trace variable '{}'.", var.name)));
            }
            if var.draws.len() != n_chains || var.draws.iter().any(|c| c.len() != n_draws) {
                return Err(AppError::validation(format!(
                    "Trace variable '{}' does not have {n_chains} chains of {n_draws} draws.",
                    var.name
                )));
            }
            if var.draws.iter().flatten().any(|x| !x.is_finite()) {
                return Err(AppError::validation(format!(
                    "Trace variable '{}' contains non-finite draws.",
                    var.name
                )));
            }
        }

        Ok(Self {
            n_chains,
            n_draws,
            variables,
            sampler_stats: Vec::new(),
        })
    }

    pub fn with_sampler_stats(mut self, stats: Vec<ChainStats>) -> Self {
        self.sampler_stats = stats;
        self
    }

    pub fn n_chains(&self) -> usize {
        self.n_chains
    }

    /// Draws per chain.
    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    pub fn total_draws(&self) -> usize {
        self.n_chains * self.n_draws
    }

    pub fn is_empty(&self) -> bool {
        self.total_draws() == 0 || self.variables.is_empty()
    }

    pub fn var_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    pub fn sampler_stats(&self) -> &[ChainStats] {
        &self.sampler_stats
    }

    pub fn divergences(&self) -> usize {
        self.sampler_stats.iter().map(|s| s.divergences).sum()
    }

    /// Per-chain draws of `name`.
    pub fn chains(&self, name: &str) -> Result<&[Vec<f64>], AppError> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.draws.as_slice())
            .ok_or_else(|| {
                AppError::lookup(format!(
                    "Variable '{name}' not found in trace. Available: {}.",
                    self.var_names().join(", ")
                ))
            })
    }

    /// All draws of `name`, chains concatenated in order.
    pub fn flat(&self, name: &str) -> Result<Vec<f64>, AppError> {
        Ok(self.chains(name)?.iter().flatten().copied().collect())
    }

    pub fn mean(&self, name: &str) -> Result<f64, AppError> {
        Ok(math::mean(&self.flat(name)?))
    }

    /// Population standard deviation of the pooled draws.
    pub fn std(&self, name: &str) -> Result<f64, AppError> {
        Ok(math::std(&self.flat(name)?))
    }

    /// Integer point estimate of a discrete variable.
    ///
    /// Mean and median are rounded half-to-even; the mode takes the smallest
    /// value among equally frequent ones.
    pub fn point_estimate(&self, name: &str, method: EstimateMethod) -> Result<i64, AppError> {
        let draws = self.flat(name)?;
        if draws.is_empty() {
            return Err(AppError::validation(format!("Trace variable '{name}' has no draws.")));
        }
        let estimate = match method {
            EstimateMethod::Mean => math::mean(&draws).round_ties_even() as i64,
            EstimateMethod::Median => math::median(&draws).round_ties_even() as i64,
            EstimateMethod::Mode => math::integer_mode(&draws)
                .ok_or_else(|| AppError::validation(format!("Trace variable '{name}' has no draws.")))?,
        };
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tau_trace(chains: Vec<Vec<f64>>) -> PosteriorTrace {
        PosteriorTrace::from_chains(vec![("tau", chains)]).unwrap()
    }

    #[test]
    fn shape_is_checked() {
        let err = PosteriorTrace::from_chains(vec![
            ("tau", vec![vec![1.0, 2.0], vec![1.0, 2.0]]),
            ("mu_1", vec![vec![1.0, 2.0], vec![1.0]]),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = PosteriorTrace::from_chains(vec![("a", vec![vec![1.0]]), ("a", vec![vec![1.0]])]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = PosteriorTrace::from_chains(vec![("a", vec![vec![f64::INFINITY]])]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn unknown_variable_is_a_lookup_error() {
        let trace = tau_trace(vec![vec![1.0, 2.0]]);
        assert!(matches!(trace.chains("beta"), Err(AppError::Lookup(_))));
        assert_eq!(trace.total_draws(), 2);
        assert!(trace.contains("tau"));
    }

    #[test]
    fn point_estimates_follow_rounding_rules() {
        // mean 50.5 rounds to even 50
        let trace = tau_trace(vec![vec![50.0, 51.0], vec![50.0, 51.0]]);
        assert_eq!(trace.point_estimate("tau", EstimateMethod::Mean).unwrap(), 50);
        assert_eq!(trace.point_estimate("tau", EstimateMethod::Median).unwrap(), 50);
        // tie between 50 and 51 goes to the smaller value
        assert_eq!(trace.point_estimate("tau", EstimateMethod::Mode).unwrap(), 50);

        let trace = tau_trace(vec![vec![51.0, 52.0, 52.0]]);
        assert_eq!(trace.point_estimate("tau", EstimateMethod::Mean).unwrap(), 52);
        assert_eq!(trace.point_estimate("tau", EstimateMethod::Mode).unwrap(), 52);
    }

    #[test]
    fn flat_concatenates_in_chain_order() {
        let trace = tau_trace(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(trace.flat("tau").unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(trace.n_chains(), 2);
        assert_eq!(trace.n_draws(), 2);
    }

    #[test]
    fn json_round_trip_keeps_sampler_stats() {
        let stats = ChainStats {
            chain: 0,
            seed: 7,
            step_size: 0.4,
            acceptance_rate: 0.93,
            divergences: 0,
            tune: 10,
            draws: 2,
        };
        let trace = tau_trace(vec![vec![1.0, 2.0]]).with_sampler_stats(vec![stats]);
        let json = serde_json::to_string(&trace).unwrap();
        let back: PosteriorTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trace);
    }

    #[test]
    fn malformed_json_traces_are_rejected() {
        let ragged = r#"{"n_chains":2,"n_draws":5,"variables":[
            {"name":"tau","draws":[[1,2,3,4,5],[1]]}],"sampler_stats":[]}"#;
        assert!(serde_json::from_str::<PosteriorTrace>(ragged).is_err());

        let duplicate = r#"{"n_chains":1,"n_draws":1,"variables":[
            {"name":"tau","draws":[[1]]},{"name":"tau","draws":[[2]]}],"sampler_stats":[]}"#;
        assert!(serde_json::from_str::<PosteriorTrace>(duplicate).is_err());

        let wrong_header = r#"{"n_chains":7,"n_draws":99,"variables":[
            {"name":"tau","draws":[[1,2]]}],"sampler_stats":[]}"#;
        assert!(serde_json::from_str::<PosteriorTrace>(wrong_header).is_err());
    }
}
