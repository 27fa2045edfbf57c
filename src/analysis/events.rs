//! Matching change points to nearby external events.

use chrono::NaiveDate;

use crate::domain::{ChangePointRecord, Event, EventAssociation, EventTable, NearbyEvent};
use crate::error::AppError;

/// Events within `±window_days` of `date` (inclusive), closest first.
///
/// Equal distances keep the input order.
pub fn events_near(date: NaiveDate, events: &[Event], window_days: i64) -> Vec<NearbyEvent> {
    let mut nearby: Vec<NearbyEvent> = events
        .iter()
        .filter_map(|event| {
            let days = (event.date - date).num_days();
            (days.abs() <= window_days).then(|| NearbyEvent {
                event: event.clone(),
                days_from_changepoint: days,
            })
        })
        .collect();
    nearby.sort_by_key(|n| n.days_from_changepoint.abs());
    nearby
}

/// Associate every change point with the events in its window.
///
/// Errors:
/// - `Validation` for a negative window or an unparsable event date
/// - `Config` when `date_column` is not in the table
/// - `Lookup` when a change point has no date
pub fn associate_with_events(
    changepoints: &[ChangePointRecord],
    events: &EventTable,
    window_days: i64,
    date_column: &str,
) -> Result<Vec<EventAssociation>, AppError> {
    if window_days < 0 {
        return Err(AppError::validation(format!("window_days must be >= 0 (got {window_days}).")));
    }
    let events = events.events(date_column)?;

    changepoints
        .iter()
        .map(|cp| {
            let changepoint_date = cp.date.ok_or_else(|| {
                AppError::lookup(format!(
                    "Change point at index {} has no date; event association needs a dated series.",
                    cp.index
                ))
            })?;
            let associated_events = events_near(changepoint_date, &events, window_days);
            let closest_event = associated_events.first().cloned();
            Ok(EventAssociation {
                changepoint_date,
                changepoint_index: cp.index,
                window_days,
                days_from_closest: closest_event.as_ref().map(|e| e.days_from_changepoint),
                closest_event,
                num_events_in_window: associated_events.len(),
                associated_events,
            })
        })
        .collect()
}
