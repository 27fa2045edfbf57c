//! Mathematical utilities: descriptive statistics and stable reductions.

pub mod stats;

pub use stats::*;
