//! CSV ingest for price series and event tables.
//!
//! Price files are strict:
//! - the value and date columns must exist (configuration error otherwise)
//! - every row needs a parsable date and a finite value
//! - rows are sorted by date; duplicate dates are rejected
//!
//! Event files are read as raw string tables; typed events are produced later
//! against a chosen date column (see `EventTable::events`).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};

use crate::domain::{EventTable, Series, parse_date};
use crate::error::AppError;

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn normalized_headers(headers: &StringRecord) -> Vec<String> {
    headers.iter().map(normalize_header_name).collect()
}

fn open(path: &Path, what: &str) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::io(format!("Failed to open {what} CSV '{}': {e}", path.display())))
}

/// Load a dated price series from a CSV file.
pub fn load_series(path: &Path, value_column: &str, date_column: &str) -> Result<Series, AppError> {
    let series = read_series(open(path, "price")?, value_column, date_column)?;
    if let Some((first, last)) = series.summary().date_range {
        info!(
            "Loaded {} observations of '{value_column}' from {} ({first} to {last})",
            series.len(),
            path.display()
        );
    }
    Ok(series)
}

/// Parse a dated series from any CSV reader.
pub fn read_series<R: Read>(reader: R, value_column: &str, date_column: &str) -> Result<Series, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = normalized_headers(
        reader
            .headers()
            .map_err(|e| AppError::io(format!("Failed to read CSV headers: {e}")))?,
    );

    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            AppError::config(format!(
                "CSV must contain a '{name}' column. Found: {}.",
                headers.join(", ")
            ))
        })
    };
    let date_idx = column(date_column)?;
    let value_idx = column(value_column)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::io(format!("CSV parse error on line {line}: {e}")))?;

        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| AppError::validation(format!("Line {line}: cannot parse date '{raw_date}'.")))?;

        let raw_value = record.get(value_idx).unwrap_or("");
        let value = raw_value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Line {line}: missing or non-numeric {value_column} '{raw_value}'; clean the data first."
                ))
            })?;
        rows.push((date, value));
    }

    if rows.is_empty() {
        return Err(AppError::validation("CSV contains no data rows."));
    }

    rows.sort_by_key(|(date, _)| *date);
    if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(AppError::validation(format!("Duplicate date {} in price data.", w[0].0)));
    }
    debug!("Parsed {} price rows", rows.len());

    let (dates, values): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
    Ok(Series::with_timestamps(values, dates)?.named(value_column))
}

/// Load an event table from a CSV file.
pub fn load_events(path: &Path) -> Result<EventTable, AppError> {
    let table = read_events(open(path, "events")?)?;
    info!("Loaded {} events from {}", table.len(), path.display());
    Ok(table)
}

pub fn read_events<R: Read>(reader: R) -> Result<EventTable, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = normalized_headers(
        reader
            .headers()
            .map_err(|e| AppError::io(format!("Failed to read events CSV headers: {e}")))?,
    );
    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AppError::io(format!("Events CSV parse error on line {}: {e}", idx + 2)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    EventTable::new(headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn series_is_sorted_and_named() {
        let csv = "\u{feff}Date,Price\n22-May-87,18.55\n20-May-87,18.63\n21-May-87,18.45\n";
        let series = read_series(csv.as_bytes(), "Price", "Date").unwrap();
        assert_eq!(series.values(), &[18.63, 18.45, 18.55]);
        assert_eq!(series.date_at(0), NaiveDate::from_ymd_opt(1987, 5, 20));
        assert_eq!(series.name(), "Price");
    }

    #[test]
    fn bad_rows_are_rejected() {
        let missing = "Date,Price\n2020-01-01,1.0\n2020-01-02,\n";
        assert!(matches!(read_series(missing.as_bytes(), "Price", "Date"), Err(AppError::Validation(_))));

        let dup = "Date,Price\n2020-01-01,1.0\n2020-01-01,2.0\n";
        assert!(matches!(read_series(dup.as_bytes(), "Price", "Date"), Err(AppError::Validation(_))));

        let bad_date = "Date,Price\nsoon,1.0\n";
        assert!(matches!(read_series(bad_date.as_bytes(), "Price", "Date"), Err(AppError::Validation(_))));

        let no_column = "Day,Price\n2020-01-01,1.0\n";
        assert!(matches!(read_series(no_column.as_bytes(), "Price", "Date"), Err(AppError::Config(_))));
    }

    #[test]
    fn events_keep_raw_columns() {
        let csv = "date,event_name,event_type,description,expected_impact\n\
                   2020-03-09,Price war,geopolitical,OPEC+ collapse,decrease\n";
        let table = read_events(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        let events = table.events("date").unwrap();
        assert_eq!(events[0].name, "Price war");
        assert_eq!(events[0].expected_impact.as_deref(), Some("decrease"));
    }
}
