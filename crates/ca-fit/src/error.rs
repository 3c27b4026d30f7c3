//! Error types for guessing and fitting.

use ca_core::CaError;
use ca_models::ModelError;
use ca_signal::SignalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Order {order} is unsupported; expected 1, 2 or 3")]
    UnsupportedOrder { order: i64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Model produced NaN residuals ({count} of {total})")]
    NanResidual { count: usize, total: usize },

    #[error("Optimizer failed: {what}")]
    Optimizer { what: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Core(#[from] CaError),
}

pub type FitRes<T> = Result<T, FitError>;

impl From<argmin::core::Error> for FitError {
    fn from(e: argmin::core::Error) -> Self {
        // cost errors raised by the residual come back wrapped; unwrap them
        match e.downcast::<FitError>() {
            Ok(inner) => inner,
            Err(e) => FitError::Optimizer {
                what: e.to_string(),
            },
        }
    }
}
