//! Error types for the analysis layer.

use crate::source::SourceError;
use ca_signal::SignalError;
use thiserror::Error;

/// Errors returned by analysis objects.
///
/// Problems an analysis can live with go into its
/// [`ProblemLedger`](crate::ProblemLedger) instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Case error: {0}")]
    Case(String),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("Fit error: {0}")]
    Fit(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("Missing data: {what}")]
    MissingData { what: String },

    #[error("Refused: {reason}")]
    Refused { reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for ca-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ca_case::CaseError> for AppError {
    fn from(err: ca_case::CaseError) -> Self {
        AppError::Case(err.to_string())
    }
}

impl From<ca_fit::FitError> for AppError {
    fn from(err: ca_fit::FitError) -> Self {
        match err {
            ca_fit::FitError::Signal(e) => AppError::Signal(e),
            other => AppError::Fit(other.to_string()),
        }
    }
}

impl From<ca_metrics::MetricsError> for AppError {
    fn from(err: ca_metrics::MetricsError) -> Self {
        match err {
            ca_metrics::MetricsError::Signal(e) => AppError::Signal(e),
            other => AppError::Metrics(other.to_string()),
        }
    }
}

impl From<ca_results::ResultsError> for AppError {
    fn from(err: ca_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}

impl From<ca_core::CaError> for AppError {
    fn from(err: ca_core::CaError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
