use ca_core::CaError;
use thiserror::Error;

pub type SignalResult<T> = Result<T, SignalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Core error: {0}")]
    Core(#[from] CaError),

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A setting would make the computation unreasonably expensive.
    /// `max_scale` is the largest smoothing scale that would be accepted.
    #[error("Bad input value: {what} (use scale <= {max_scale})")]
    BadInputValue { what: String, max_scale: f64 },

    #[error("x is not evenly spaced: std(dx)/mean(dx) = {variation} > {threshold}")]
    UnevenSpacing { variation: f64, threshold: f64 },

    #[error("Input of length {len} is shorter than window length {window}")]
    WindowTooLong { window: usize, len: usize },
}
