//! ca-fit: parameter estimation for the response models.
//!
//! - guess: heuristic starting values and bounds
//! - resample: uniform fit grid with a missing-data mask
//! - residual: weighted residuals and model evaluation per shot
//! - optimize: argmin Nelder-Mead with restarts
//! - fit: the fitting entry point and its result
//! - specs: second order time-domain specifications

pub mod error;
pub mod fit;
pub mod guess;
pub mod optimize;
pub mod resample;
pub mod residual;
pub mod specs;

pub use error::{FitError, FitRes};
pub use fit::{
    DEFAULT_FIT_NPTS, FitMethod, FitNanPolicy, FitRequest, FitResult, FitStatus, FitUnits, ParamUnits,
    fit_response_model,
};
pub use guess::{FirstOrderGuess, make_first_order_guess, make_guess};
pub use optimize::{Minimum, NelderMeadConfig, minimize};
pub use resample::{FitInputs, resample};
pub use residual::{evaluate_model, model_residual};
pub use specs::{TimeDomainSpecs, time_domain_specs_order_2};
