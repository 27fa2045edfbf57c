//! Shared "detect pipeline" logic.
//!
//! The workflow is:
//! CSV ingest -> (log returns) -> build -> fit -> convergence gate -> summary -> analysis
//!
//! The binary only prints and exports what [`run_detect`] returns, so the whole
//! workflow can be exercised from tests without spawning a process.

use log::{info, warn};

use crate::analysis::{BatchAnalysis, batch_analyze_with};
use crate::diagnostics::{ConvergenceReport, Diagnostics, ParameterSummary};
use crate::domain::{EventTable, PARAM_NAMES, RunConfig, Series};
use crate::error::AppError;
use crate::io::export::ResultFile;
use crate::models::ChangePointModel;

/// All computed outputs of a single `cpd detect` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub model: ChangePointModel,
    pub events: Option<EventTable>,
    pub convergence: ConvergenceReport,
    pub parameters: Vec<ParameterSummary>,
    pub analysis: BatchAnalysis,
}

impl RunOutput {
    /// The series the model was fitted to.
    pub fn series(&self) -> &Series {
        self.model.series()
    }

    /// Export schema for `--export`.
    pub fn result_file(&self, config: &RunConfig) -> ResultFile {
        ResultFile {
            tool: format!("cpd {}", env!("CARGO_PKG_VERSION")),
            input: config.input.display().to_string(),
            series: self.series().summary(),
            log_returns: config.log_returns,
            model: config.model,
            sampler: config.sampler,
            convergence: self.convergence.clone(),
            parameters: self.parameters.clone(),
            analysis: self.analysis.clone(),
        }
    }
}

/// Load the input CSV(s) named by `config` and run the full pipeline.
pub fn run_detect(config: &RunConfig) -> Result<RunOutput, AppError> {
    let mut series = crate::io::load_series(&config.input, &config.value_column, &config.date_column)?;
    if config.log_returns {
        series = series.log_returns()?;
        info!("Using {} log returns", series.len());
    }

    let events = match &config.events {
        Some(path) => Some(crate::io::load_events(path)?),
        None => None,
    };

    run_detect_on(series, events, config)
}

/// Run the pipeline on an already loaded series and event table.
pub fn run_detect_on(series: Series, events: Option<EventTable>, config: &RunConfig) -> Result<RunOutput, AppError> {
    if let Some(table) = &events {
        check_event_table(table, &config.analysis.date_column)?;
    }

    let mut model = ChangePointModel::new(series);
    model.build(config.model)?;
    model.fit(&config.sampler)?;
    let trace = model.trace()?;

    let diagnostics = Diagnostics::new(trace);
    let convergence = diagnostics.convergence_report(&PARAM_NAMES, &config.thresholds)?;
    for issue in &convergence.issues {
        warn!("Convergence issue: {}", issue.describe());
    }
    if !convergence.converged && config.strict {
        let details: Vec<String> = convergence.issues.iter().map(|i| i.describe()).collect();
        return Err(AppError::numerical(format!(
            "Sampler did not converge: {}",
            details.join("; ")
        )));
    }

    let parameters = diagnostics.summary(&PARAM_NAMES, config.analysis.confidence)?;
    let analysis = batch_analyze_with(trace, model.series(), events.as_ref(), &config.analysis)?;

    Ok(RunOutput {
        model,
        events,
        convergence,
        parameters,
        analysis,
    })
}

/// Fail before sampling when the event table cannot be associated.
fn check_event_table(table: &EventTable, date_column: &str) -> Result<(), AppError> {
    if !table.has_column(date_column) {
        return Err(AppError::config(format!(
            "Events table has no '{date_column}' column (found: {}).",
            table.headers().join(", ")
        )));
    }
    if table.is_empty() {
        warn!("Events table is empty; no change point will be associated.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConvergenceThresholds, ModelConfig, SamplerConfig};

    fn config() -> RunConfig {
        RunConfig {
            input: "unused.csv".into(),
            value_column: "Price".to_string(),
            date_column: "Date".to_string(),
            log_returns: false,
            events: None,
            model: ModelConfig::default(),
            sampler: SamplerConfig::default(),
            thresholds: ConvergenceThresholds::default(),
            analysis: Default::default(),
            strict: false,
            export: None,
            export_trace: None,
        }
    }

    #[test]
    fn event_table_without_date_column_fails_before_sampling() {
        let table = EventTable::new(
            vec!["when".to_string(), "event_name".to_string()],
            vec![vec!["2020-01-05".to_string(), "rate cut".to_string()]],
        )
        .unwrap();
        // Too short to build: a Config error proves the table is checked first.
        let series = Series::new(vec![1.0, 2.0, 3.0]).unwrap();
        let err = run_detect_on(series, Some(table), &config()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("when"));
    }
}
