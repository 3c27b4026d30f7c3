use crate::params::ParamName;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Order {order} is unsupported; use 1, 2, or 3")]
    UnsupportedOrder { order: i64 },

    #[error("Missing parameter: {name}")]
    MissingParameter { name: ParamName },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
