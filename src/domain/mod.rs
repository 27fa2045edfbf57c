//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the input series and configuration (`Series`, `ModelConfig`, `SamplerConfig`)
//! - analysis outputs (`ChangePointRecord`, `ImpactRecord`, `EventAssociation`)
//! - the raw event table handed over by the data-loading layer (`EventTable`)

pub mod events;
pub mod types;

pub use events::*;
pub use types::*;
