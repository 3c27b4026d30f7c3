//! Noise estimation for evenly sampled signals.
//!
//! Variation faster than the cutoff frequency is assumed to be random noise.
//! The estimate is the Hilbert envelope of the high-pass part, scaled by
//! `sqrt(1/2)` (the standard deviation of a unit sine) and low-pass filtered.

use crate::butter::{ButterKind, Butterworth};
use crate::error::{SignalError, SignalResult};
use crate::spectral::hilbert_envelope;
use ca_core::{diff, nanmean, nanstd};
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use tracing::{debug, warn};

/// Allowed `std(dt)/mean(dt)` before the time base counts as uneven.
pub const DEFAULT_DT_VAR_THRESH: f64 = 1e-9;

const FILTER_ORDER: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct NoiseEstimate {
    /// Low-pass part of the signal
    pub smoothed: Vec<f64>,
    /// Per-sample uncertainty
    pub uncertainty: Vec<f64>,
}

/// Estimate the uncertainty in `y(t)`.
///
/// `cutoff_timescale` plays the role of an RC time constant; the cutoff
/// frequency is `1 / (2 pi cutoff_timescale)`. A cutoff at or above Nyquist is
/// pulled just below it.
pub fn noise_estimator(
    t: &[f64],
    y: &[f64],
    cutoff_timescale: f64,
    dt_var_thresh: f64,
) -> SignalResult<NoiseEstimate> {
    if t.len() != y.len() {
        return Err(SignalError::Core(ca_core::CaError::LengthMismatch {
            what: "noise_estimator y",
            expected: t.len(),
            got: y.len(),
        }));
    }
    if !(cutoff_timescale > 0.0) {
        return Err(SignalError::InvalidArg {
            what: "cutoff_timescale must be positive",
        });
    }
    if t.len() < 3 {
        return Err(SignalError::InvalidArg {
            what: "noise_estimator needs at least three samples",
        });
    }
    let dts = diff(t);
    let dt = nanmean(&dts);
    let dt_var = nanstd(&dts) / dt;
    if dt_var > dt_var_thresh {
        return Err(SignalError::UnevenSpacing {
            variation: dt_var,
            threshold: dt_var_thresh,
        });
    }
    let sample_frequency = 1.0 / dt;
    let nyquist = 0.5 * sample_frequency;
    let df = sample_frequency / t.len() as f64;
    let mut cutoff = 1.0 / cutoff_timescale / (2.0 * PI);
    if cutoff >= nyquist {
        let old = cutoff;
        cutoff = nyquist - 0.5 * df;
        warn!(old, new = cutoff, "noise_estimator: cutoff frequency must be below nyquist");
    }
    debug!(cutoff_timescale, cutoff, dt, sample_frequency, "noise_estimator");
    let wn = cutoff / nyquist;

    let high = Butterworth::design(FILTER_ORDER, wn, ButterKind::HighPass)?;
    let low = Butterworth::design(FILTER_ORDER, wn, ButterKind::LowPass)?;

    let yhf = high.filtfilt(y);
    let envelope: Vec<f64> = hilbert_envelope(&yhf)
        .into_iter()
        .map(|v| v * FRAC_1_SQRT_2)
        .collect();
    let uncertainty = low.filtfilt(&envelope).into_iter().map(f64::abs).collect();
    let smoothed = low.filtfilt(y);
    Ok(NoiseEstimate {
        smoothed,
        uncertainty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::linspace;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn recovers_white_noise_level() {
        let t = linspace(0.0, 10.0, 2001);
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.2).unwrap();
        let y: Vec<f64> = t
            .iter()
            .map(|ti| (0.3 * ti).sin() + noise.sample(&mut rng))
            .collect();
        let est = noise_estimator(&t, &y, 0.5, 1e-3).unwrap();
        let mid = &est.uncertainty[200..1800];
        let mean = mid.iter().sum::<f64>() / mid.len() as f64;
        // Rayleigh-distributed envelope: expect about 0.89 sigma
        assert!(mean > 0.08 && mean < 0.3, "mean uncertainty {mean}");
    }

    #[test]
    fn uneven_time_base_is_rejected() {
        let t = [0.0, 1.0, 2.5, 3.0, 4.0];
        let y = [0.0; 5];
        assert!(matches!(
            noise_estimator(&t, &y, 1.0, 1e-3),
            Err(SignalError::UnevenSpacing { .. })
        ));
    }

    #[test]
    fn clean_signal_has_small_uncertainty() {
        let t = linspace(0.0, 10.0, 1001);
        let y = vec![2.0; 1001];
        let est = noise_estimator(&t, &y, 0.5, 1e-3).unwrap();
        assert!(est.uncertainty.iter().all(|v| *v < 1e-9));
        assert!(est.smoothed.iter().all(|v| (v - 2.0).abs() < 1e-9));
    }
}
