//! Reporting utilities: formatted terminal output for `cpd detect`.

pub mod format;

pub use format::*;
