//! ca-signal: signal conditioning.
//!
//! Smoothing (five interchangeable methods behind [`smooth`]), Butterworth
//! filtering, FFT-based scale selection and periodic-noise removal, noise
//! estimation, and the trapezoid/interpolation/derivative helpers the fit and
//! metric crates share.

pub mod butter;
pub mod error;
pub mod noise;
pub mod smooth;
pub mod spectral;
pub mod stats;
pub mod window;

pub use butter::{ButterKind, Butterworth};
pub use error::{SignalError, SignalResult};
pub use noise::{NoiseEstimate, noise_estimator};
pub use smooth::{SmoothSettings, Smoother, smooth};
pub use spectral::{MinFreq, PeriodicNoiseRemoval, auto_scale, hilbert_envelope, remove_periodic_noise};
pub use stats::{Extrapolate, corrcoef, cumtrapz, deriv, interp1d, mean_trapz, trapz};
pub use window::WindowFunction;
