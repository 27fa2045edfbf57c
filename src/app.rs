//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - runs the detect pipeline (ingest, fit, diagnostics, analysis)
//! - prints reports
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{Command, DetectArgs, SimulateArgs};
use crate::data::SimulationSpec;
use crate::domain::{AnalysisOptions, ConvergenceThresholds, ModelConfig, RunConfig, SamplerConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `cpd` binary.
pub fn run() -> Result<(), AppError> {
    // `cpd --input prices.csv` behaves like `cpd detect --input prices.csv`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Detect(args) => handle_detect(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_detect(args: DetectArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_detect(&config)?;
    let trace = run.model.trace()?;

    println!("{}", crate::report::format_run_summary(&run.series().summary(), &config));
    println!("{}", crate::report::format_chain_stats(trace.sampler_stats()));
    println!(
        "{}",
        crate::report::format_parameter_table(&run.parameters, config.analysis.confidence)
    );
    println!("{}", crate::report::format_convergence(&run.convergence));
    println!("{}", run.analysis.statement);

    if let Some(path) = &config.export {
        crate::io::write_result_json(path, &run.result_file(&config))?;
        info!("Wrote results to {}", path.display());
    }
    if let Some(path) = &config.export_trace {
        crate::io::write_trace_json(path, trace)?;
        info!("Wrote posterior trace to {}", path.display());
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = SimulationSpec {
        n_before: args.n_before,
        n_after: args.n_after,
        mu_before: args.mu_before,
        mu_after: args.mu_after,
        sigma_before: args.sigma_before,
        sigma_after: args.sigma_after,
        start_date: args.start_date,
        seed: args.seed,
    };
    let series = crate::data::generate_two_regime(&spec)?.named(args.value_column.as_str());
    crate::io::write_series_csv(&args.output, &series)?;

    println!(
        "Wrote {} observations to {} (true change point at index {})",
        series.len(),
        args.output.display(),
        spec.true_changepoint()
    );
    Ok(())
}

pub fn run_config_from_args(args: &DetectArgs) -> RunConfig {
    RunConfig {
        input: args.input.clone(),
        value_column: args.value_column.clone(),
        date_column: args.date_column.clone(),
        log_returns: args.log_returns,
        events: args.events.clone(),

        model: ModelConfig {
            prior_std_scale: args.prior_std_scale,
            min_segment_length: args.min_segment_length,
        },
        sampler: SamplerConfig {
            samples: args.samples,
            tune: args.tune,
            chains: args.chains,
            target_accept: args.target_accept,
            seed: args.seed,
        },
        thresholds: ConvergenceThresholds {
            rhat: args.rhat_threshold,
            ess_bulk: args.ess_threshold,
            ess_tail: args.ess_threshold,
        },
        analysis: AnalysisOptions {
            confidence: args.confidence,
            method: args.method,
            window_days: args.window_days,
            include_volatility: !args.no_volatility,
            date_column: args.event_date_column.clone(),
        },

        strict: args.strict,
        export: args.export.clone(),
        export_trace: args.export_trace.clone(),
    }
}

/// Rewrite argv so flags without a subcommand run `detect`.
///
/// Rules:
/// - `cpd -i x.csv ...`         -> `cpd detect -i x.csv ...`
/// - `cpd --help/--version/-h`  -> unchanged (show top-level help/version)
/// - `cpd` or `cpd <subcommand>` -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1) else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version");
    if !is_top_level_help_or_version && arg1.starts_with('-') {
        argv.insert(1, "detect".to_string());
    }
    argv
}
