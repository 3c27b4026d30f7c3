//! How well the measurement follows changes in the target.

use crate::error::MetricsResult;
use ca_core::{nanmax, nanmean, nanmin, nanstd};
use ca_signal::{SmoothSettings, corrcoef, cumtrapz, deriv, smooth};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum normalised swing of |target| for it to count as varying.
pub const TARGET_VARIATION_THRESHOLD: f64 = 1e-6;

/// One shot of control data on a shared x grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlSeries {
    pub x: Vec<f64>,
    pub measurement: Vec<f64>,
    pub target: Vec<f64>,
    /// `measurement - target`
    pub err: Vec<f64>,
    pub uncertainty: Option<Vec<f64>>,
}

impl ControlSeries {
    pub fn new(x: Vec<f64>, measurement: Vec<f64>, target: Vec<f64>) -> Self {
        let mut s = Self {
            x,
            measurement,
            target,
            err: Vec::new(),
            uncertainty: None,
        };
        s.recompute_err();
        s
    }

    pub fn with_uncertainty(mut self, uncertainty: Vec<f64>) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn recompute_err(&mut self) {
        self.err = self
            .measurement
            .iter()
            .zip(&self.target)
            .map(|(m, t)| m - t)
            .collect();
    }
}

/// Whether `|target|` swings by more than the threshold after scaling by `norm`.
pub fn target_varies(target: &[f64], norm: f64) -> bool {
    let abs: Vec<f64> = target.iter().map(|t| t.abs()).collect();
    (nanmax(&abs) - nanmin(&abs)) * norm > TARGET_VARIATION_THRESHOLD
}

/// Give a flat target a step so tracking can be judged.
///
/// A sample one step before the start is prepended. Its measurement and
/// target are the mean of the measurement over the first `scale` of x, and
/// its uncertainty is their spread. Its error is NaN, so the synthetic
/// sample never counts as perfect tracking. Returns false, leaving the
/// series alone, when there are fewer than two samples.
pub fn make_effective_target(series: &mut ControlSeries, scale: f64) -> bool {
    if series.len() < 2 {
        return false;
    }
    let x0 = series.x[0];
    let dx0 = series.x[1] - x0;
    let early: Vec<f64> = series
        .x
        .iter()
        .zip(&series.measurement)
        .filter(|(x, _)| *x - x0 <= scale)
        .map(|(_, &y)| y)
        .collect();
    let y0 = nanmean(&early);
    if series.err.len() != series.len() {
        series.recompute_err();
    }
    series.x.insert(0, x0 - dx0);
    series.measurement.insert(0, y0);
    series.target.insert(0, y0);
    if let Some(e) = series.uncertainty.as_mut() {
        e.insert(0, nanstd(&early));
    }
    series.err.insert(0, f64::NAN);
    debug!(y0, n_early = early.len(), "effective target built");
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingHistories {
    pub dtarget_dx: Vec<f64>,
    pub dtarget_dx_smooth: Vec<f64>,
    pub smoothed_target: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingMetrics {
    /// |corr(smoothed dtarget/dx, RMS error history)|
    pub lethargy: f64,
    /// |corr(target, err)|
    pub scorn: f64,
    pub histories: TrackingHistories,
}

/// Lethargy and scorn of one shot.
///
/// `rms_error_history` is the smoothed RMS error on the same grid. Both
/// metrics are NaN when the target does not vary. Causal smoothing smooths
/// the target and differentiates it; acausal smoothing smooths the
/// derivative and integrates it back.
pub fn tracking_metrics(
    series: &ControlSeries,
    rms_error_history: &[f64],
    varies: bool,
    smoothing: &SmoothSettings,
) -> MetricsResult<TrackingMetrics> {
    let (x, target) = (&series.x, &series.target);
    if !varies {
        return Ok(TrackingMetrics {
            lethargy: f64::NAN,
            scorn: f64::NAN,
            histories: TrackingHistories {
                dtarget_dx: vec![0.0; x.len()],
                dtarget_dx_smooth: vec![0.0; x.len()],
                smoothed_target: target.clone(),
            },
        });
    }
    let dtdx = deriv(x, target);
    let (smoothed_target, dtdxs) = if smoothing.causal {
        let st = smooth(x, target, smoothing)?;
        let d = deriv(x, &st);
        (st, d)
    } else {
        let d = smooth(x, &dtdx, smoothing)?;
        let t0 = target.first().copied().unwrap_or(f64::NAN);
        let st = cumtrapz(&d, x).into_iter().map(|v| v + t0).collect();
        (st, d)
    };
    Ok(TrackingMetrics {
        lethargy: corrcoef(&dtdxs, rms_error_history).abs(),
        scorn: corrcoef(target, &series.err).abs(),
        histories: TrackingHistories {
            dtarget_dx: dtdx,
            dtarget_dx_smooth: dtdxs,
            smoothed_target,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::linspace;
    use ca_signal::Smoother;

    #[test]
    fn flat_targets_do_not_vary() {
        assert!(!target_varies(&[2.0, 2.0, -2.0], 1.0));
        assert!(target_varies(&[2.0, 2.5, f64::NAN], 1.0));
        assert!(!target_varies(&[2.0, 2.5], f64::NAN));
    }

    #[test]
    fn effective_target_prepends_the_early_mean() {
        let x = vec![1.0, 1.5, 2.0, 2.5, 3.0];
        let m = vec![3.0, 5.0, 10.0, 10.0, 10.0];
        let mut s = ControlSeries::new(x, m, vec![10.0; 5]).with_uncertainty(vec![0.1; 5]);
        assert!(make_effective_target(&mut s, 0.5));
        assert_eq!(s.len(), 6);
        assert_eq!(s.x[0], 0.5);
        assert_eq!(s.measurement[0], 4.0);
        assert_eq!(s.target[0], 4.0);
        assert!(s.err[0].is_nan());
        assert_eq!(s.err[1], -7.0);
        assert_eq!(s.err.len(), 6);
        assert!((s.uncertainty.as_ref().unwrap()[0] - 1.0).abs() < 1e-12);
        assert!(target_varies(&s.target, 1.0));
    }

    #[test]
    fn synthetic_sample_is_left_out_of_scorn() {
        let x = linspace(0.0, 2.0, 21);
        let m: Vec<f64> = x.iter().map(|t| 10.0 + 0.1 * t).collect();
        let mut s = ControlSeries::new(x, m, vec![10.0; 21]);
        assert!(make_effective_target(&mut s, 0.5));
        let settings = SmoothSettings::new(Smoother::Butterworth, 0.5);
        let t = tracking_metrics(&s, &vec![1.0; s.len()], true, &settings).unwrap();
        // the only target movement is the synthetic step, whose error is undefined
        assert!(t.scorn.is_nan());
    }

    #[test]
    fn sluggish_tracking_is_lethargic() {
        let x = linspace(0.0, 10.0, 201);
        let target: Vec<f64> = x.iter().map(|t| (t * 0.8).sin()).collect();
        let meas: Vec<f64> = x.iter().map(|t| 0.5 * ((t - 0.8) * 0.8).sin()).collect();
        let s = ControlSeries::new(x.clone(), meas, target);
        let settings = SmoothSettings::new(Smoother::Butterworth, 0.5);
        let rms = smooth(&x, &s.err.iter().map(|e| e * e).collect::<Vec<_>>(), &settings)
            .unwrap()
            .into_iter()
            .map(f64::sqrt)
            .collect::<Vec<_>>();
        let t = tracking_metrics(&s, &rms, true, &settings).unwrap();
        assert!(t.scorn > 0.5 && t.scorn <= 1.0);
        assert!((0.0..=1.0).contains(&t.lethargy));
        assert_eq!(t.histories.smoothed_target.len(), 201);
        assert!((t.histories.dtarget_dx[100] - 0.8 * (5.0f64 * 0.8).cos()).abs() < 1e-2);
    }

    #[test]
    fn no_variation_means_no_tracking_metrics() {
        let s = ControlSeries::new(vec![0.0, 1.0], vec![1.0, 2.0], vec![1.0, 1.0]);
        let settings = SmoothSettings::new(Smoother::Butterworth, 0.5);
        let t = tracking_metrics(&s, &[0.0, 0.0], false, &settings).unwrap();
        assert!(t.lethargy.is_nan() && t.scorn.is_nan());
        assert_eq!(t.histories.dtarget_dx, vec![0.0, 0.0]);
    }
}
