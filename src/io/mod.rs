//! Input/output helpers.
//!
//! - price and event CSV ingest (`ingest`)
//! - result/trace JSON and series CSV exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
