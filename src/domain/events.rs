//! Tabular event input.
//!
//! Event files come from a collaborator, so the table keeps the raw header and
//! string cells. Typed [`Event`]s are materialised on demand against a chosen
//! date column; this is where a missing column turns into a configuration error.

use serde::{Deserialize, Serialize};

use crate::domain::types::{Event, parse_date};
use crate::error::AppError;

/// Standard column layout written by [`EventTable::from_events`].
pub const EVENT_COLUMNS: [&str; 5] = ["date", "event_name", "event_type", "description", "expected_impact"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEventTable")]
pub struct EventTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct RawEventTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TryFrom<RawEventTable> for EventTable {
    type Error = AppError;

    fn try_from(raw: RawEventTable) -> Result<Self, Self::Error> {
        EventTable::new(raw.headers, raw.rows)
    }
}

impl EventTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, AppError> {
        if let Some(i) = rows.iter().position(|r| r.len() != headers.len()) {
            return Err(AppError::validation(format!(
                "Event row {i} has {} cells but the header has {} columns.",
                rows[i].len(),
                headers.len()
            )));
        }
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Ok(Self { headers, rows })
    }

    /// Build a table in the standard layout from typed events.
    pub fn from_events(events: &[Event]) -> Self {
        let headers = EVENT_COLUMNS.iter().map(|c| c.to_string()).collect();
        let rows = events
            .iter()
            .map(|e| {
                vec![
                    e.date.format("%Y-%m-%d").to_string(),
                    e.name.clone(),
                    e.event_type.clone(),
                    e.description.clone().unwrap_or_default(),
                    e.expected_impact.clone().unwrap_or_default(),
                ]
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn first_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.column_index(n))
    }

    /// Materialise typed events, reading dates from `date_column`.
    pub fn events(&self, date_column: &str) -> Result<Vec<Event>, AppError> {
        let Some(date_idx) = self.column_index(date_column) else {
            return Err(AppError::config(format!(
                "Events table must have a '{date_column}' column (found: {}).",
                self.headers.join(", ")
            )));
        };
        let name_idx = self.first_column(&["event_name", "name"]);
        let type_idx = self.first_column(&["event_type", "type"]);
        let desc_idx = self.column_index("description");
        let impact_idx = self.column_index("expected_impact");

        let cell = |row: &[String], idx: Option<usize>| -> Option<String> {
            idx.map(|i| row[i].trim().to_string()).filter(|s| !s.is_empty())
        };

        let mut out = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let raw = &row[date_idx];
            let date = parse_date(raw).ok_or_else(|| {
                AppError::validation(format!("Event row {i}: cannot parse date '{raw}' in column '{date_column}'."))
            })?;
            out.push(Event {
                date,
                name: cell(row, name_idx).unwrap_or_else(|| format!("event {i}")),
                event_type: cell(row, type_idx).unwrap_or_else(|| "unknown".to_string()),
                description: cell(row, desc_idx),
                expected_impact: cell(row, impact_idx),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(name: &str, y: i32, m: u32, d: u32) -> Event {
        Event {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            name: name.to_string(),
            event_type: "geopolitical".to_string(),
            description: None,
            expected_impact: Some("increase".to_string()),
        }
    }

    #[test]
    fn from_events_round_trips_through_standard_columns() {
        let events = vec![event("A", 2020, 1, 1), event("B", 2021, 6, 30)];
        let table = EventTable::from_events(&events);
        assert!(table.has_column("date"));
        assert_eq!(table.events("date").unwrap(), events);
    }

    #[test]
    fn missing_date_column_is_a_config_error() {
        let table = EventTable::new(
            vec!["when".to_string(), "event_name".to_string()],
            vec![vec!["2020-01-01".to_string(), "A".to_string()]],
        )
        .unwrap();
        assert!(matches!(table.events("date"), Err(AppError::Config(_))));
        assert_eq!(table.events("when").unwrap()[0].name, "A");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = EventTable::new(vec!["date".to_string()], vec![vec![]]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn deserialized_table_is_validated() {
        let table: EventTable = serde_json::from_str(r#"{"headers":["date","event_name"],"rows":[["2020-01-05","cut"]]}"#)
            .unwrap();
        assert_eq!(table.len(), 1);
        let ragged = r#"{"headers":["date","event_name"],"rows":[["2020-01-05"]]}"#;
        assert!(serde_json::from_str::<EventTable>(ragged).is_err());
    }
}
