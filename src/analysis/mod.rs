//! Turning a posterior trace into change-point findings.
//!
//! All functions here are pure: they read a trace, the original series and
//! (optionally) an event table, and return serializable records.

pub mod changepoint;
pub mod events;
pub mod impact;
pub mod statement;

pub use changepoint::*;
pub use events::*;
pub use impact::*;
pub use statement::*;

use log::info;
use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisOptions, ChangePointRecord, EventAssociation, EventTable, ImpactRecord, Series};
use crate::error::AppError;
use crate::fit::PosteriorTrace;

/// Everything `batch_analyze` produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnalysis {
    pub changepoints: Vec<ChangePointRecord>,
    pub impact: ImpactRecord,
    /// `None` when no event table was supplied.
    pub associations: Option<Vec<EventAssociation>>,
    pub statement: String,
}

/// Run the full analysis with default options and the given event window.
pub fn batch_analyze(
    trace: &PosteriorTrace,
    series: &Series,
    events: Option<&EventTable>,
    window_days: i64,
) -> Result<BatchAnalysis, AppError> {
    let options = AnalysisOptions {
        window_days,
        ..AnalysisOptions::default()
    };
    batch_analyze_with(trace, series, events, &options)
}

/// Locate, quantify, associate, then narrate.
///
/// `options.confidence` is the HDI mass for every interval produced here, the
/// τ interval and the regime mean/scale intervals alike.
pub fn batch_analyze_with(
    trace: &PosteriorTrace,
    series: &Series,
    events: Option<&EventTable>,
    options: &AnalysisOptions,
) -> Result<BatchAnalysis, AppError> {
    let changepoints = identify_changepoints(trace, series, options.confidence, options.method)?;
    let impact = quantify_impact_at(trace, series, options.include_volatility, options.confidence)?;

    let associations = match events {
        Some(table) => Some(associate_with_events(
            &changepoints,
            table,
            options.window_days,
            &options.date_column,
        )?),
        None => None,
    };

    let statement = match changepoints.first() {
        Some(cp) => generate_impact_statement(cp, &impact, associations.as_ref().and_then(|a| a.first())),
        None => String::new(),
    };
    if let Some(cp) = changepoints.first() {
        info!(
            "Change point at index {} ({}), mean {} / magnitude {}",
            cp.index,
            cp.date.map_or_else(|| "undated".to_string(), |d| d.to_string()),
            impact.direction,
            impact.magnitude
        );
    }

    Ok(BatchAnalysis {
        changepoints,
        impact,
        associations,
        statement,
    })
}
