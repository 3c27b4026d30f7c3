use thiserror::Error;

pub type CaResult<T> = Result<T, CaError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Empty input: {what}")]
    Empty { what: &'static str },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
