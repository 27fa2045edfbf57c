//! Change-point location from the τ posterior.

use crate::diagnostics::hdi;
use crate::domain::{ChangePointRecord, EstimateMethod, Series, TAU};
use crate::error::AppError;
use crate::fit::PosteriorTrace;
use crate::math;

/// Locate the change point: point estimate, HDI widened to whole indices,
/// posterior std, and dates when the series carries them.
///
/// Returns a list so callers do not change shape if several change points
/// are ever reported; today it always holds exactly one record.
pub fn identify_changepoints(
    trace: &PosteriorTrace,
    series: &Series,
    confidence: f64,
    method: EstimateMethod,
) -> Result<Vec<ChangePointRecord>, AppError> {
    if trace.is_empty() {
        return Err(AppError::validation("Trace holds no posterior draws."));
    }
    if !trace.contains(TAU) {
        return Err(AppError::validation("Trace must contain the 'tau' change-point variable."));
    }
    hdi::check_probability(confidence)?;

    let draws = trace.flat(TAU)?;
    let n = series.len();
    let in_range = |x: i64| -> Result<usize, AppError> {
        usize::try_from(x)
            .ok()
            .filter(|i| *i < n)
            .ok_or_else(|| AppError::validation(format!("Change-point index {x} is outside a series of {n} points.")))
    };

    let index = in_range(trace.point_estimate(TAU, method)?)?;
    let (lo, hi) = hdi::hdi(&draws, confidence)?.integer_bounds();
    let credible_interval = (in_range(lo)?, in_range(hi)?);

    let ci_dates = match (series.date_at(credible_interval.0), series.date_at(credible_interval.1)) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    };

    Ok(vec![ChangePointRecord {
        index,
        date: series.date_at(index),
        estimate_method: method,
        credible_interval,
        ci_dates,
        ci_probability: confidence,
        posterior_std: math::std(&draws),
        posterior_samples: draws.len(),
    }])
}
