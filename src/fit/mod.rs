//! Posterior sampling.
//!
//! Responsibilities:
//!
//! - HMC primitives for the continuous regime parameters (`hmc`)
//! - the hybrid Gibbs/HMC chain driver, run in parallel (`sampler`)
//! - the resulting per-chain draws (`trace`)

pub mod hmc;
pub mod sampler;
pub mod trace;

pub use sampler::*;
pub use trace::*;
