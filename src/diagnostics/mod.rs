//! Convergence diagnostics and interval summaries over a posterior trace.
//!
//! Every method accepting `var_names` treats an empty slice as "all variables
//! in the trace". Unknown names are lookup errors.

pub mod convergence;
pub mod hdi;

pub use hdi::Hdi;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::domain::ConvergenceThresholds;
use crate::error::AppError;
use crate::fit::PosteriorTrace;
use crate::math;

/// Which convergence statistic failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Rhat,
    EssBulk,
    EssTail,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::Rhat => "R-hat",
            IssueKind::EssBulk => "ESS bulk",
            IssueKind::EssTail => "ESS tail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceIssue {
    pub var: String,
    pub kind: IssueKind,
    pub value: f64,
    pub threshold: f64,
}

impl ConvergenceIssue {
    pub fn describe(&self) -> String {
        let relation = match self.kind {
            IssueKind::Rhat => ">",
            IssueKind::EssBulk | IssueKind::EssTail => "<",
        };
        format!(
            "{} {} = {:.3} {relation} {}",
            self.var,
            self.kind.as_str(),
            self.value,
            self.threshold
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub converged: bool,
    pub issues: Vec<ConvergenceIssue>,
}

/// One row of the posterior summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub hdi_lower: f64,
    pub hdi_upper: f64,
    pub ess_bulk: f64,
    pub ess_tail: f64,
    pub r_hat: f64,
}

/// Read-only diagnostics view of a trace.
#[derive(Debug, Clone, Copy)]
pub struct Diagnostics<'a> {
    trace: &'a PosteriorTrace,
}

impl<'a> Diagnostics<'a> {
    pub fn new(trace: &'a PosteriorTrace) -> Self {
        Self { trace }
    }

    fn resolve(&self, var_names: &[&'a str]) -> Result<Vec<&'a str>, AppError> {
        if var_names.is_empty() {
            return Ok(self.trace.var_names());
        }
        for name in var_names {
            self.trace.chains(name)?;
        }
        Ok(var_names.to_vec())
    }

    pub fn rhat(&self, name: &str) -> Result<f64, AppError> {
        Ok(convergence::rhat(self.trace.chains(name)?))
    }

    pub fn ess_bulk(&self, name: &str) -> Result<f64, AppError> {
        Ok(convergence::ess_bulk(self.trace.chains(name)?))
    }

    pub fn ess_tail(&self, name: &str) -> Result<f64, AppError> {
        Ok(convergence::ess_tail(self.trace.chains(name)?))
    }

    pub fn hdi(&self, name: &str, prob: f64) -> Result<Hdi, AppError> {
        hdi::hdi(&self.trace.flat(name)?, prob)
    }

    /// Every threshold violation among `var_names`. `NaN` statistics count
    /// as violations.
    pub fn convergence_report(
        &self,
        var_names: &[&'a str],
        thresholds: &ConvergenceThresholds,
    ) -> Result<ConvergenceReport, AppError> {
        let mut issues = Vec::new();
        for name in self.resolve(var_names)? {
            let r = self.rhat(name)?;
            if r.is_nan() || r > thresholds.rhat {
                issues.push(ConvergenceIssue {
                    var: name.to_string(),
                    kind: IssueKind::Rhat,
                    value: r,
                    threshold: thresholds.rhat,
                });
            }
            let bulk = self.ess_bulk(name)?;
            if bulk.is_nan() || bulk < thresholds.ess_bulk {
                issues.push(ConvergenceIssue {
                    var: name.to_string(),
                    kind: IssueKind::EssBulk,
                    value: bulk,
                    threshold: thresholds.ess_bulk,
                });
            }
            let tail = self.ess_tail(name)?;
            if tail.is_nan() || tail < thresholds.ess_tail {
                issues.push(ConvergenceIssue {
                    var: name.to_string(),
                    kind: IssueKind::EssTail,
                    value: tail,
                    threshold: thresholds.ess_tail,
                });
            }
        }
        Ok(ConvergenceReport {
            converged: issues.is_empty(),
            issues,
        })
    }

    /// `true` when every variable passes; violations are logged as warnings.
    pub fn check_convergence(
        &self,
        var_names: &[&'a str],
        thresholds: &ConvergenceThresholds,
    ) -> Result<bool, AppError> {
        let report = self.convergence_report(var_names, thresholds)?;
        for issue in &report.issues {
            warn!("Convergence issue: {}", issue.describe());
        }
        Ok(report.converged)
    }

    pub fn summary(&self, var_names: &[&'a str], hdi_prob: f64) -> Result<Vec<ParameterSummary>, AppError> {
        hdi::check_probability(hdi_prob)?;
        self.resolve(var_names)?
            .into_iter()
            .map(|name| {
                let flat = self.trace.flat(name)?;
                let interval = hdi::hdi(&flat, hdi_prob)?;
                Ok(ParameterSummary {
                    name: name.to_string(),
                    mean: math::mean(&flat),
                    sd: math::std(&flat),
                    hdi_lower: interval.lower,
                    hdi_upper: interval.upper,
                    ess_bulk: self.ess_bulk(name)?,
                    ess_tail: self.ess_tail(name)?,
                    r_hat: self.rhat(name)?,
                })
            })
            .collect()
    }

    /// Bulk ESS per variable.
    pub fn effective_n(&self, var_names: &[&'a str]) -> Result<Vec<(String, f64)>, AppError> {
        self.resolve(var_names)?
            .into_iter()
            .map(|name| Ok((name.to_string(), self.ess_bulk(name)?)))
            .collect()
    }

    pub fn rhat_all(&self, var_names: &[&'a str]) -> Result<Vec<(String, f64)>, AppError> {
        self.resolve(var_names)?
            .into_iter()
            .map(|name| Ok((name.to_string(), self.rhat(name)?)))
            .collect()
    }
}
