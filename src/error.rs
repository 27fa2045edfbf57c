//! Crate-wide error type.
//!
//! Every failure is one of a small number of classes so callers (and the
//! `cpd` binary) can react without parsing messages:
//!
//! - `Validation`: caller-fixable input problems (exit code 2)
//! - `Config`: missing columns / inconsistent options (exit code 2)
//! - `State`: operations called out of order (exit code 3)
//! - `Lookup`: unknown parameter names, missing dates (exit code 3)
//! - `Io`: file, CSV and JSON failures (exit code 4)
//! - `Numerical`: non-finite values produced during sampling (exit code 4)

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("state error: {0}")]
    State(String),
    #[error("lookup error: {0}")]
    Lookup(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("numerical error: {0}")]
    Numerical(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    /// Process exit code used by the `cpd` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Validation(_) | AppError::Config(_) => 2,
            AppError::State(_) | AppError::Lookup(_) => 3,
            AppError::Io(_) | AppError::Numerical(_) => 4,
        }
    }
}
