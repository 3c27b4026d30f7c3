//! Error types for metric calculations.

use ca_core::CaError;
use ca_signal::SignalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Core(#[from] CaError),
}

pub type MetricsResult<T> = Result<T, MetricsError>;
