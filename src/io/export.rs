//! JSON and CSV exports.
//!
//! - result JSON: configuration, convergence, parameter table and analysis
//!   of one `cpd detect` run (schema: [`ResultFile`])
//! - trace JSON: the raw posterior draws, for re-analysis elsewhere
//! - series CSV: `date,value` rows written by `cpd simulate`

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::BatchAnalysis;
use crate::diagnostics::{ConvergenceReport, ParameterSummary};
use crate::domain::{ModelConfig, SamplerConfig, Series, SeriesSummary};
use crate::error::AppError;
use crate::fit::PosteriorTrace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub input: String,
    pub series: SeriesSummary,
    pub log_returns: bool,
    pub model: ModelConfig,
    pub sampler: SamplerConfig,
    pub convergence: ConvergenceReport,
    pub parameters: Vec<ParameterSummary>,
    pub analysis: BatchAnalysis,
}

fn create(path: &Path, what: &str) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::io(format!("Failed to create {what} '{}': {e}", path.display())))
}

fn write_json<T: Serialize>(path: &Path, what: &str, value: &T) -> Result<(), AppError> {
    let mut writer = create(path, what)?;
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| AppError::io(format!("Failed to write {what}: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to write {what}: {e}")))
}

pub fn write_result_json(path: &Path, result: &ResultFile) -> Result<(), AppError> {
    write_json(path, "result JSON", result)
}

pub fn write_trace_json(path: &Path, trace: &PosteriorTrace) -> Result<(), AppError> {
    write_json(path, "trace JSON", trace)
}

pub fn read_trace_json(path: &Path) -> Result<PosteriorTrace, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open trace JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::io(format!("Invalid trace JSON: {e}")))
}

/// Write `date,value` rows (or `index,value` for undated series).
pub fn write_series_csv(path: &Path, series: &Series) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(create(path, "series CSV")?);
    let err = |e: csv::Error| AppError::io(format!("Failed to write series CSV: {e}"));

    let dated = series.timestamps().is_some();
    writer
        .write_record([if dated { "Date" } else { "index" }, series.name()])
        .map_err(err)?;
    for (i, value) in series.values().iter().enumerate() {
        let key = match series.date_at(i) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => i.to_string(),
        };
        writer.write_record([key, value.to_string()]).map_err(err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to write series CSV: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_series;
    use chrono::NaiveDate;

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("bayes-cpd-{}-{name}", std::process::id()))
    }

    #[test]
    fn series_csv_reads_back() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let dates = (0..3).map(|i| start + chrono::Duration::days(i)).collect();
        let series = Series::with_timestamps(vec![1.5, -2.0, 3.25], dates).unwrap().named("Price");

        let path = scratch("series.csv");
        write_series_csv(&path, &series).unwrap();
        let back = read_series(File::open(&path).unwrap(), "Price", "Date").unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back, series);
    }

    #[test]
    fn trace_json_reads_back() {
        let trace = PosteriorTrace::from_chains(vec![("tau", vec![vec![3.0, 4.0]])]).unwrap();
        let path = scratch("trace.json");
        write_trace_json(&path, &trace).unwrap();
        let back = read_trace_json(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back, trace);
    }

    #[test]
    fn inconsistent_trace_file_is_rejected() {
        let path = scratch("ragged-trace.json");
        std::fs::write(
            &path,
            r#"{"n_chains":2,"n_draws":2,"variables":[{"name":"tau","draws":[[1,2],[3]]}],"sampler_stats":[]}"#,
        )
        .unwrap();
        let err = read_trace_json(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().contains("tau"));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let trace = PosteriorTrace::from_chains(vec![("tau", vec![vec![1.0]])]).unwrap();
        let err = write_trace_json(Path::new("/nonexistent-dir/trace.json"), &trace).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
