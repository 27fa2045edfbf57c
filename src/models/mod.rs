//! The single change-point model.
//!
//! `likelihood` holds the pure density pieces the sampler evaluates;
//! `model` owns the series and the build/fit lifecycle.

pub mod likelihood;
pub mod model;

pub use model::*;
