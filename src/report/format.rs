//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the sampling/analysis code stays clean and testable
//! - output changes are localized

use crate::diagnostics::{ConvergenceReport, ParameterSummary};
use crate::domain::{RunConfig, SeriesSummary};
use crate::fit::ChainStats;

/// Header block: input, series statistics and sampler settings.
pub fn format_run_summary(summary: &SeriesSummary, config: &RunConfig) -> String {
    let mut out = String::new();

    out.push_str("=== cpd - Bayesian change point detection ===\n");
    out.push_str(&format!("Input: {}\n", config.input.display()));
    out.push_str(&format!(
        "Series: {}{}\n",
        config.value_column,
        if config.log_returns { " (log returns)" } else { "" }
    ));
    if let Some((first, last)) = summary.date_range {
        out.push_str(&format!("Dates: {first} to {last}\n"));
    }
    out.push_str(&format!(
        "Points: n={} | mean={:.4} | std={:.4} | range=[{:.4}, {:.4}]\n",
        summary.count, summary.mean, summary.std, summary.min, summary.max
    ));
    out.push_str(&format!(
        "Model: prior_std_scale={} | min_segment_length={}\n",
        config.model.prior_std_scale, config.model.min_segment_length
    ));
    out.push_str(&format!(
        "Sampler: chains={} | tune={} | draws={} | target_accept={}\n",
        config.sampler.chains, config.sampler.tune, config.sampler.samples, config.sampler.target_accept
    ));
    out.push('\n');
    out
}

/// Per-chain sampler statistics.
pub fn format_chain_stats(stats: &[ChainStats]) -> String {
    let mut out = String::new();
    out.push_str("Chains:\n");
    out.push_str(&format!(
        "{:>5} {:>20} {:>10} {:>10} {:>11}\n",
        "chain", "seed", "step", "accept", "divergent"
    ));
    for s in stats {
        out.push_str(&format!(
            "{:>5} {:>20} {:>10.4} {:>10.3} {:>11}\n",
            s.chain, s.seed, s.step_size, s.acceptance_rate, s.divergences
        ));
    }
    out
}

/// Posterior summary table (mean, sd, HDI, ESS, R-hat).
pub fn format_parameter_table(rows: &[ParameterSummary], hdi_prob: f64) -> String {
    let pct = (hdi_prob * 100.0).round() as i64;
    let lo = format!("hdi_{}%", 50 - pct / 2);
    let hi = format!("hdi_{}%", 50 + pct / 2);

    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:>12} {:>10} {:>12} {:>12} {:>9} {:>9} {:>7}\n",
        "param", "mean", "sd", lo, hi, "ess_bulk", "ess_tail", "r_hat"
    ));
    out.push_str(&format!("{}\n", "-".repeat(88)));
    for r in rows {
        out.push_str(&format!(
            "{:<10} {:>12.4} {:>10.4} {:>12.4} {:>12.4} {:>9.0} {:>9.0} {:>7.3}\n",
            r.name, r.mean, r.sd, r.hdi_lower, r.hdi_upper, r.ess_bulk, r.ess_tail, r.r_hat
        ));
    }
    out
}

pub fn format_convergence(report: &ConvergenceReport) -> String {
    if report.converged {
        return "Convergence: OK (all R-hat and ESS thresholds met)\n".to_string();
    }
    let mut out = format!("Convergence: FAILED ({} issue(s))\n", report.issues.len());
    for issue in &report.issues {
        out.push_str(&format!("  - {}\n", issue.describe()));
    }
    out
}
