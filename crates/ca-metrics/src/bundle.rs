//! All control-quality metrics of one shot.

use crate::error::{MetricsError, MetricsResult};
use crate::standard::{IntegralErrors, IntegralTraces, WindowedMetrics, calculate_standard_metrics};
use crate::tracking::{
    ControlSeries, TrackingHistories, make_effective_target, target_varies, tracking_metrics,
};
use ca_core::{NanPolicy, nanmax, nanmin, nanptp, units};
use ca_fit::FitResult;
use ca_models::ParamName;
use ca_signal::{SmoothSettings, mean_trapz, smooth};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Normalisations below this are treated as undefined.
pub const MIN_NORM: f64 = 1e-14;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSettings {
    pub smoothing: SmoothSettings,
    /// Build a synthetic step when the target is flat
    pub allowed_to_make_effective_target: bool,
    /// Extra `[t0, t1]` windows
    pub xwin: Vec<(f64, f64)>,
    /// Units of measurement and target
    pub units: String,
    pub x_units: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricUnits {
    pub integral_square_error: String,
    pub integral_absolute_error: String,
    pub integral_time_absolute_error: String,
    pub rms_error: String,
    pub time_interval: String,
}

/// Scalars of one normalisation.
///
/// `time_interval` is only filled for the raw set; `lethargy`, `scorn` and
/// the gain errors only for the normalised one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(flatten)]
    pub integrals: IntegralErrors,
    pub rms_error: f64,
    pub time_interval: Option<f64>,
    pub lethargy: Option<f64>,
    pub scorn: Option<f64>,
    /// `gain - 1` keyed by fit order
    pub gain_error: BTreeMap<u8, f64>,
    pub units: MetricUnits,
}

impl MetricSet {
    /// `(key, value, units)` rows for reports, in a stable order.
    pub fn rows(&self) -> Vec<(String, f64, String)> {
        let u = &self.units;
        let mut rows = vec![
            (
                "integral_square_error".to_string(),
                self.integrals.integral_square_error,
                u.integral_square_error.clone(),
            ),
            (
                "integral_absolute_error".to_string(),
                self.integrals.integral_absolute_error,
                u.integral_absolute_error.clone(),
            ),
            (
                "integral_time_absolute_error".to_string(),
                self.integrals.integral_time_absolute_error,
                u.integral_time_absolute_error.clone(),
            ),
            ("RMS_error".to_string(), self.rms_error, u.rms_error.clone()),
        ];
        if let Some(t) = self.time_interval {
            rows.push(("time_interval".to_string(), t, u.time_interval.clone()));
        }
        if let Some(l) = self.lethargy {
            rows.push(("lethargy".to_string(), l, String::new()));
        }
        if let Some(s) = self.scorn {
            rows.push(("scorn".to_string(), s, String::new()));
        }
        for (order, g) in &self.gain_error {
            rows.push((format!("gain_error_order_{order}"), *g, String::new()));
        }
        rows
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// 1 / RMS(target), NaN when the target is ~0 everywhere
    pub norm: f64,
    pub norm_units: String,
    /// 1 / duration
    pub xnorm: f64,
    pub xnorm_units: String,
    pub target_varies: bool,
    /// A synthetic step was prepended
    pub effective_target: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricHistories {
    pub raw: IntegralTraces,
    pub normalized: IntegralTraces,
    pub rms_error: Vec<f64>,
    pub rms_error_norm: Vec<f64>,
    #[serde(flatten)]
    pub tracking: TrackingHistories,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub summary: Summary,
    pub raw: MetricSet,
    pub normalized: MetricSet,
    pub windowed: Vec<WindowedMetrics>,
    pub histories: MetricHistories,
}

impl MetricsBundle {
    /// Store `gain - 1` of a fit where the target was treated as the command.
    pub fn record_gain_error(&mut self, fit: &FitResult) -> Option<f64> {
        let g = gain_error(fit)?;
        self.normalized.gain_error.insert(fit.order.as_u8(), g);
        Some(g)
    }
}

/// `gain - 1`. With the target as the command, a perfect controller has unit gain.
pub fn gain_error(fit: &FitResult) -> Option<f64> {
    fit.value(ParamName::Gain).map(|g| g - 1.0)
}

fn sqrt_smoothed(x: &[f64], sq: &[f64], smoothing: &SmoothSettings) -> MetricsResult<Vec<f64>> {
    Ok(smooth(x, sq, smoothing)?.into_iter().map(f64::sqrt).collect())
}

/// Compute every metric for one shot.
///
/// When the target is flat and `settings.allowed_to_make_effective_target`
/// is set, `series` gets a synthetic leading sample (see
/// [`make_effective_target`]); the histories computed before that get a
/// leading NaN so all traces stay aligned with `series.x`.
pub fn calculate_control_metrics(
    series: &mut ControlSeries,
    settings: &MetricSettings,
) -> MetricsResult<MetricsBundle> {
    let n = series.len();
    if series.measurement.len() != n || series.target.len() != n {
        return Err(MetricsError::InvalidArg {
            what: "x, measurement and target must have the same length",
        });
    }
    if n < 2 {
        return Err(MetricsError::InvalidArg {
            what: "need at least two samples",
        });
    }
    series.recompute_err();
    let (x, err) = (series.x.clone(), series.err.clone());
    let (u, xu) = (settings.units.as_str(), settings.x_units.as_str());

    let target_sq: Vec<f64> = series.target.iter().map(|t| t * t).collect();
    let mut norm = 1.0 / mean_trapz(&target_sq, Some(&x), NanPolicy::Ignore).sqrt();
    if !(norm.is_finite() && norm >= MIN_NORM) {
        warn!(norm, "target is too close to zero to normalise; normalised metrics will be NaN");
        norm = f64::NAN;
    }
    let xnorm = 1.0 / (nanmax(&x) - nanmin(&x));
    let mut varies = target_varies(&series.target, norm);

    let err_sq: Vec<f64> = err.iter().map(|e| e * e).collect();
    let err_norm_sq: Vec<f64> = err_sq.iter().map(|e| e * norm * norm).collect();
    let rms_raw = mean_trapz(&err_sq, Some(&x), NanPolicy::Ignore).sqrt();
    let rms_norm = mean_trapz(&err_norm_sq, None, NanPolicy::Ignore).sqrt();
    let mut rms_error = sqrt_smoothed(&x, &err_sq, &settings.smoothing)?;
    let mut rms_error_norm = sqrt_smoothed(&x, &err_norm_sq, &settings.smoothing)?;

    let mut standard = calculate_standard_metrics(&x, &err, norm, xnorm, &settings.xwin);

    let mut effective_target = false;
    if !varies && settings.allowed_to_make_effective_target {
        effective_target = make_effective_target(series, settings.smoothing.scale);
        if effective_target {
            for v in [&mut rms_error, &mut rms_error_norm] {
                v.insert(0, f64::NAN);
            }
            standard.raw_traces.prepend_nan();
            standard.normalized_traces.prepend_nan();
            varies = target_varies(&series.target, 1.0);
        }
    }
    let tracking = tracking_metrics(series, &rms_error, varies, &settings.smoothing)?;
    debug!(
        norm,
        xnorm,
        varies,
        effective_target,
        lethargy = tracking.lethargy,
        scorn = tracking.scorn,
        "control metrics calculated"
    );

    let raw = MetricSet {
        integrals: standard.raw,
        rms_error: rms_raw,
        time_interval: Some(nanptp(&x)),
        lethargy: None,
        scorn: None,
        gain_error: BTreeMap::new(),
        units: MetricUnits {
            integral_square_error: units::join(&[&units::squared(u), xu]),
            integral_absolute_error: units::join(&[u, xu]),
            integral_time_absolute_error: units::join(&[u, &units::squared(xu)]),
            rms_error: u.to_string(),
            time_interval: xu.to_string(),
        },
    };
    let normalized = MetricSet {
        integrals: standard.normalized,
        rms_error: rms_norm,
        time_interval: None,
        lethargy: Some(tracking.lethargy),
        scorn: Some(tracking.scorn),
        gain_error: BTreeMap::new(),
        units: MetricUnits::default(),
    };
    Ok(MetricsBundle {
        summary: Summary {
            norm,
            norm_units: units::inverse(u),
            xnorm,
            xnorm_units: units::inverse(xu),
            target_varies: varies,
            effective_target,
        },
        raw,
        normalized,
        windowed: standard.windowed,
        histories: MetricHistories {
            raw: standard.raw_traces,
            normalized: standard.normalized_traces,
            rms_error,
            rms_error_norm,
            tracking: tracking.histories,
        },
    })
}
