//! ca-core: shared foundation for the control-analysis workspace.
//!
//! Contains:
//! - error (shared error type)
//! - numeric (Real, tolerances, NaN-aware reductions)
//! - shots (N samples x S shots container)
//! - units (unit-string bookkeeping + time conversions)
//! - naming (case descriptions and result keys)

pub mod error;
pub mod naming;
pub mod numeric;
pub mod shots;
pub mod units;

pub use error::{CaError, CaResult};
pub use naming::*;
pub use numeric::*;
pub use shots::Shots;
