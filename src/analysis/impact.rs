//! Before/after effect sizes.

use chrono::{Duration, NaiveDate};

use crate::diagnostics::hdi;
use crate::domain::{
    Direction, EventWindowImpact, ImpactRecord, MU_1, MU_2, Magnitude, SIGMA_1, SIGMA_2, Series, VolatilityDirection,
    VolatilityImpact,
};
use crate::error::AppError;
use crate::fit::PosteriorTrace;
use crate::math;
use crate::models::DEFAULT_HDI_PROB;

/// Denominators smaller than this make a percentage change undefined.
pub const PCT_EPSILON: f64 = 1e-12;

/// Shifts below this many percent are reported as `minimal`.
const MINIMAL_PCT: f64 = 5.0;

fn pct_change(change: f64, base: f64) -> Option<f64> {
    (base.abs() >= PCT_EPSILON).then(|| change / base.abs() * 100.0)
}

fn classify_direction(mean_change: f64, pct: Option<f64>) -> Direction {
    let minimal = match pct {
        Some(p) => p.abs() < MINIMAL_PCT,
        None => mean_change.abs() < PCT_EPSILON,
    };
    if minimal {
        Direction::Minimal
    } else if mean_change > 0.0 {
        Direction::Increase
    } else {
        Direction::Decrease
    }
}

/// Posterior mean and HDI of one parameter.
fn mean_and_hdi(trace: &PosteriorTrace, name: &str, prob: f64) -> Result<(f64, (f64, f64)), AppError> {
    let draws = trace.flat(name)?;
    Ok((math::mean(&draws), hdi::hdi(&draws, prob)?.as_tuple()))
}

/// Quantify the shift in mean (and optionally scale) at the change point,
/// using 94% HDIs.
pub fn quantify_impact(
    trace: &PosteriorTrace,
    series: &Series,
    include_volatility: bool,
) -> Result<ImpactRecord, AppError> {
    quantify_impact_at(trace, series, include_volatility, DEFAULT_HDI_PROB)
}

/// [`quantify_impact`] with an explicit HDI probability.
pub fn quantify_impact_at(
    trace: &PosteriorTrace,
    series: &Series,
    include_volatility: bool,
    hdi_prob: f64,
) -> Result<ImpactRecord, AppError> {
    let (mu_before, mu_before_ci) = mean_and_hdi(trace, MU_1, hdi_prob)?;
    let (mu_after, mu_after_ci) = mean_and_hdi(trace, MU_2, hdi_prob)?;

    let mean_change = mu_after - mu_before;
    let mean_change_pct = pct_change(mean_change, mu_before);
    let direction = classify_direction(mean_change, mean_change_pct);

    let std = series.std();
    let magnitude_in_std = if std > 0.0 { mean_change.abs() / std } else { 0.0 };

    let volatility = if include_volatility {
        let (sigma_before, sigma_before_ci) = mean_and_hdi(trace, SIGMA_1, hdi_prob)?;
        let (sigma_after, sigma_after_ci) = mean_and_hdi(trace, SIGMA_2, hdi_prob)?;
        let sigma_change = sigma_after - sigma_before;
        Some(VolatilityImpact {
            sigma_before,
            sigma_after,
            sigma_before_ci,
            sigma_after_ci,
            sigma_change,
            sigma_change_pct: pct_change(sigma_change, sigma_before),
            volatility_direction: if sigma_change > 0.0 {
                VolatilityDirection::Increase
            } else {
                VolatilityDirection::Decrease
            },
        })
    } else {
        None
    };

    Ok(ImpactRecord {
        mu_before,
        mu_after,
        mu_before_ci,
        mu_after_ci,
        mean_change,
        mean_change_pct,
        direction,
        magnitude: Magnitude::from_std_units(magnitude_in_std),
        magnitude_in_std,
        volatility,
    })
}

/// Raw-series statistics in `[event - w, event)` versus `(event, event + w]`.
///
/// The event day itself belongs to neither side. When either side is empty
/// the result is [`EventWindowImpact::InsufficientData`].
pub fn event_window_impact(
    series: &Series,
    event_date: NaiveDate,
    window_days: i64,
) -> Result<EventWindowImpact, AppError> {
    if window_days < 0 {
        return Err(AppError::validation(format!("window_days must be >= 0 (got {window_days}).")));
    }
    let Some(dates) = series.timestamps() else {
        return Err(AppError::lookup("Event window impact needs a series with dates."));
    };
    let start = event_date - Duration::days(window_days);
    let end = event_date + Duration::days(window_days);

    let mut before = Vec::new();
    let mut after = Vec::new();
    for (date, value) in dates.iter().zip(series.values()) {
        if *date >= start && *date < event_date {
            before.push(*value);
        } else if *date > event_date && *date <= end {
            after.push(*value);
        }
    }

    if before.is_empty() || after.is_empty() {
        return Ok(EventWindowImpact::InsufficientData {
            event_date,
            window_days,
            n_before: before.len(),
            n_after: after.len(),
        });
    }

    let mean_before = math::mean(&before);
    let mean_after = math::mean(&after);
    let change = mean_after - mean_before;
    let sample_std = |v: &[f64]| (v.len() > 1).then(|| math::sample_variance(v).sqrt());
    Ok(EventWindowImpact::Measured {
        event_date,
        window_days,
        n_before: before.len(),
        n_after: after.len(),
        mean_before,
        mean_after,
        change,
        change_pct: pct_change(change, mean_before),
        std_before: sample_std(&before),
        std_after: sample_std(&after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn regime_trace(mu: (f64, f64), sigma: (f64, f64)) -> PosteriorTrace {
        let around = |c: f64| vec![(0..50).map(|i| c + 0.01 * ((i % 5) as f64 - 2.0)).collect::<Vec<f64>>()];
        PosteriorTrace::from_chains(vec![
            (MU_1, around(mu.0)),
            (MU_2, around(mu.1)),
            (SIGMA_1, around(sigma.0)),
            (SIGMA_2, around(sigma.1)),
        ])
        .unwrap()
    }

    fn unit_series() -> Series {
        // population std 1.0
        Series::new(vec![-1.0, 1.0, -1.0, 1.0]).unwrap()
    }

    #[test]
    fn mean_shift_is_classified() {
        let impact = quantify_impact(&regime_trace((10.0, 12.5), (1.0, 2.0)), &unit_series(), true).unwrap();
        assert_relative_eq!(impact.mean_change, 2.5, epsilon = 1e-9);
        assert_relative_eq!(impact.mean_change_pct.unwrap(), 25.0, epsilon = 1e-9);
        assert_eq!(impact.direction, Direction::Increase);
        assert_eq!(impact.magnitude, Magnitude::VeryLarge);
        let vol = impact.volatility.unwrap();
        assert_eq!(vol.volatility_direction, VolatilityDirection::Increase);
        assert_relative_eq!(vol.sigma_change_pct.unwrap(), 100.0, epsilon = 1e-9);
        assert!(impact.mu_before_ci.0 <= impact.mu_before && impact.mu_before <= impact.mu_before_ci.1);
    }

    #[test]
    fn small_relative_change_is_minimal() {
        let impact = quantify_impact(&regime_trace((100.0, 103.0), (2.0, 1.0)), &unit_series(), false).unwrap();
        assert_eq!(impact.direction, Direction::Minimal);
        assert_eq!(impact.magnitude, Magnitude::VeryLarge);
        assert!(impact.volatility.is_none());
    }

    #[test]
    fn zero_baseline_has_undefined_percentage() {
        let impact = quantify_impact(&regime_trace((0.0, -0.6), (1.0, 0.5)), &unit_series(), true).unwrap();
        assert!(impact.mean_change_pct.is_none());
        assert_eq!(impact.direction, Direction::Decrease);
        assert_eq!(impact.magnitude, Magnitude::Moderate);
        assert_eq!(impact.volatility.unwrap().volatility_direction, VolatilityDirection::Decrease);
    }

    #[test]
    fn flat_series_gives_zero_magnitude() {
        let flat = Series::new(vec![3.0; 4]).unwrap();
        let impact = quantify_impact(&regime_trace((1.0, 2.0), (1.0, 1.0)), &flat, false).unwrap();
        assert_eq!(impact.magnitude_in_std, 0.0);
        assert_eq!(impact.magnitude, Magnitude::Negligible);
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    #[test]
    fn event_window_splits_around_the_event_day() {
        let dates: Vec<NaiveDate> = (1..=9).map(d).collect();
        let series = Series::with_timestamps(vec![1.0, 1.0, 2.0, 3.0, 100.0, 5.0, 6.0, 7.0, 8.0], dates).unwrap();
        match event_window_impact(&series, d(5), 2).unwrap() {
            EventWindowImpact::Measured { n_before, n_after, mean_before, mean_after, change_pct, std_before, .. } => {
                assert_eq!((n_before, n_after), (2, 2));
                assert_relative_eq!(mean_before, 2.5);
                assert_relative_eq!(mean_after, 5.5);
                assert_relative_eq!(change_pct.unwrap(), 120.0);
                assert_relative_eq!(std_before.unwrap(), 0.5f64.sqrt());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn event_window_without_data_on_one_side() {
        let dates: Vec<NaiveDate> = (1..=4).map(d).collect();
        let series = Series::with_timestamps(vec![1.0, 2.0, 3.0, 4.0], dates).unwrap();
        let res = event_window_impact(&series, d(1), 10).unwrap();
        assert!(matches!(res, EventWindowImpact::InsufficientData { n_before: 0, n_after: 3, .. }));

        let undated = Series::new(vec![1.0, 2.0]).unwrap();
        assert!(matches!(event_window_impact(&undated, d(1), 5), Err(AppError::Lookup(_))));
        assert!(matches!(event_window_impact(&series, d(1), -1), Err(AppError::Validation(_))));
    }
}
