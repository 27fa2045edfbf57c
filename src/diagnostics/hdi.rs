//! Highest-density intervals from draws.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math;

/// Narrowest interval holding `probability` of the draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hdi {
    pub lower: f64,
    pub upper: f64,
    pub probability: f64,
}

impl Hdi {
    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }

    /// Bounds widened outward to whole numbers (for discrete parameters).
    pub fn integer_bounds(&self) -> (i64, i64) {
        (self.lower.floor() as i64, self.upper.ceil() as i64)
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }
}

pub fn check_probability(prob: f64) -> Result<(), AppError> {
    if prob > 0.0 && prob < 1.0 {
        Ok(())
    } else {
        Err(AppError::validation(format!("HDI probability must be in (0, 1) (got {prob}).")))
    }
}

/// Sorted-interval search: among all windows spanning `floor(prob * n)`
/// consecutive order statistics, take the narrowest (the first one on ties).
pub fn hdi(draws: &[f64], prob: f64) -> Result<Hdi, AppError> {
    check_probability(prob)?;
    if draws.is_empty() {
        return Err(AppError::validation("Cannot compute an HDI from zero draws."));
    }
    let sorted = math::sorted(draws);
    let n = sorted.len();
    let span = (prob * n as f64).floor() as usize;

    let mut best = 0;
    let mut best_width = f64::INFINITY;
    for i in 0..n - span {
        let width = sorted[i + span] - sorted[i];
        if width < best_width {
            best_width = width;
            best = i;
        }
    }
    Ok(Hdi {
        lower: sorted[best],
        upper: sorted[best + span],
        probability: prob,
    })
}
