//! ca-results: persisting analysis results into keyed tables.

pub mod hash;
pub mod store;
pub mod types;

pub use hash::compute_case_id;
pub use store::{JsonTableStore, MemoryTableStore, ResultStore, apply_update, row};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Refusing to overwrite existing values in {table}: {columns:?}")]
    WouldOverwrite { table: String, columns: Vec<String> },

    #[error("Invalid overwrite policy: {value}")]
    InvalidPolicy { value: i64 },

    #[error("Invalid table name: {table}")]
    InvalidTable { table: String },
}
