//! ca-models: parametric dynamical response models.
//!
//! First, second and third order plus dead time models integrated with
//! explicit time stepping, and the named, bounded parameter set the fitter
//! optimizes over.

pub mod error;
pub mod params;
pub mod response;

pub use error::{ModelError, ModelResult};
pub use params::{Coefficients, ModelParameters, ParamName, Parameter};
pub use response::{ModelOrder, first_order, output_transform, second_order, simulate, third_order};
