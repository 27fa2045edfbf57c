//! `bayes-cpd` library crate.
//!
//! Bayesian detection of a single change point in a univariate series: a
//! two-regime Normal model sampled with Gibbs (for the change point) and HMC
//! (for the regime parameters), MCMC diagnostics, and impact/event analysis.
//!
//! The binary (`cpd`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (notebooks, services, other front-ends)

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
