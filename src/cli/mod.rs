//! Command-line parsing for the change-point detector.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the sampling/analysis code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::EstimateMethod;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cpd", version, about = "Bayesian single change point detection for time series")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the change-point model to a CSV series, check convergence, and report the impact.
    Detect(DetectArgs),
    /// Write a synthetic two-regime series to CSV.
    Simulate(SimulateArgs),
}

/// Options for `cpd detect`.
#[derive(Debug, Parser, Clone)]
pub struct DetectArgs {
    /// Price CSV with a header row.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    /// Column holding the observations.
    #[arg(long, default_value = "Price")]
    pub value_column: String,

    /// Column holding the observation dates.
    #[arg(long, default_value = "Date")]
    pub date_column: String,

    /// Model log returns instead of raw levels.
    #[arg(long)]
    pub log_returns: bool,

    /// Event CSV (date, event_name, event_type, description, expected_impact).
    #[arg(long, value_name = "CSV")]
    pub events: Option<PathBuf>,

    /// Column of the event CSV holding event dates.
    #[arg(long, default_value = "date")]
    pub event_date_column: String,

    /// Prior scale of the regime means and scales, in units of the series std.
    #[arg(long, default_value_t = 2.0)]
    pub prior_std_scale: f64,

    /// Minimum observations on each side of the change point.
    #[arg(long, default_value_t = 30)]
    pub min_segment_length: usize,

    /// Retained draws per chain.
    #[arg(long, default_value_t = 2000)]
    pub samples: usize,

    /// Warm-up draws per chain.
    #[arg(long, default_value_t = 1000)]
    pub tune: usize,

    #[arg(long, default_value_t = 2)]
    pub chains: usize,

    /// Target acceptance probability for step-size adaptation.
    #[arg(long, default_value_t = 0.95)]
    pub target_accept: f64,

    /// Random seed (omit for a fresh seed each run).
    #[arg(long)]
    pub seed: Option<u64>,

    /// HDI probability for credible intervals.
    #[arg(long, default_value_t = 0.94)]
    pub confidence: f64,

    /// Change-point point estimate.
    #[arg(long, value_enum, default_value_t = EstimateMethod::Mean)]
    pub method: EstimateMethod,

    /// Event association window (± days).
    #[arg(long, default_value_t = 30)]
    pub window_days: i64,

    /// Skip the volatility (sigma) comparison.
    #[arg(long)]
    pub no_volatility: bool,

    /// R-hat threshold for the convergence gate.
    #[arg(long, default_value_t = 1.01)]
    pub rhat_threshold: f64,

    /// Minimum bulk and tail ESS for the convergence gate.
    #[arg(long, default_value_t = 100.0)]
    pub ess_threshold: f64,

    /// Fail (exit code 4) when the convergence gate does not pass.
    #[arg(long)]
    pub strict: bool,

    /// Export configuration, diagnostics and analysis to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Export the raw posterior draws to JSON.
    #[arg(long = "export-trace", value_name = "JSON")]
    pub export_trace: Option<PathBuf>,
}

/// Options for `cpd simulate`.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 60)]
    pub n_before: usize,

    #[arg(long, default_value_t = 60)]
    pub n_after: usize,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub mu_before: f64,

    #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
    pub mu_after: f64,

    #[arg(long, default_value_t = 1.0)]
    pub sigma_before: f64,

    #[arg(long, default_value_t = 1.0)]
    pub sigma_after: f64,

    /// Date of the first observation (YYYY-MM-DD).
    #[arg(long, default_value = "2020-01-01")]
    pub start_date: NaiveDate,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Column name for the values.
    #[arg(long, default_value = "Price")]
    pub value_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_defaults() {
        let cli = Cli::parse_from(["cpd", "detect", "--input", "prices.csv"]);
        let Command::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.value_column, "Price");
        assert_eq!(args.min_segment_length, 30);
        assert_eq!(args.method, EstimateMethod::Mean);
        assert_eq!(args.seed, None);
        assert!(!args.strict);
    }

    #[test]
    fn simulate_accepts_negative_means() {
        let cli = Cli::parse_from(["cpd", "simulate", "-o", "out.csv", "--mu-after", "-2.5", "--seed", "3"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.mu_after, -2.5);
        assert_eq!(args.start_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(Cli::try_parse_from(["cpd", "detect", "-i", "x.csv", "--method", "average"]).is_err());
    }
}
