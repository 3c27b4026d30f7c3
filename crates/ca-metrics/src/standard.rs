//! Integral error metrics: ISE, IAE and ITAE.

use ca_signal::cumtrapz;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegralErrors {
    pub integral_square_error: f64,
    pub integral_absolute_error: f64,
    pub integral_time_absolute_error: f64,
}

impl IntegralErrors {
    pub fn nan() -> Self {
        Self {
            integral_square_error: f64::NAN,
            integral_absolute_error: f64::NAN,
            integral_time_absolute_error: f64::NAN,
        }
    }
}

/// Cumulative traces behind [`IntegralErrors`], NaN where input was missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegralTraces {
    pub integral_square_error: Vec<f64>,
    pub integral_absolute_error: Vec<f64>,
    pub integral_time_absolute_error: Vec<f64>,
}

impl IntegralTraces {
    pub(crate) fn prepend_nan(&mut self) {
        for v in [
            &mut self.integral_square_error,
            &mut self.integral_absolute_error,
            &mut self.integral_time_absolute_error,
        ] {
            v.insert(0, f64::NAN);
        }
    }
}

/// ISE, IAE and ITAE of `err(x)` over the samples where both are present.
///
/// Each is a cumulative trapezoid integral; the scalar is its last value.
pub fn calc_standard_metrics(x: &[f64], err: &[f64]) -> (IntegralErrors, IntegralTraces) {
    let n = x.len().min(err.len());
    let ok: Vec<usize> = (0..n).filter(|&i| !x[i].is_nan() && !err[i].is_nan()).collect();
    let xs: Vec<f64> = ok.iter().map(|&i| x[i]).collect();
    let trace = |f: &dyn Fn(usize) -> f64| -> Vec<f64> {
        let y: Vec<f64> = ok.iter().map(|&i| f(i)).collect();
        let mut out = vec![f64::NAN; n];
        for (&i, v) in ok.iter().zip(cumtrapz(&y, &xs)) {
            out[i] = v;
        }
        out
    };
    let traces = IntegralTraces {
        integral_square_error: trace(&|i| err[i] * err[i]),
        integral_absolute_error: trace(&|i| err[i].abs()),
        integral_time_absolute_error: trace(&|i| x[i] * err[i].abs()),
    };
    let last = |v: &[f64]| v.last().copied().unwrap_or(f64::NAN);
    let scalars = IntegralErrors {
        integral_square_error: last(&traces.integral_square_error),
        integral_absolute_error: last(&traces.integral_absolute_error),
        integral_time_absolute_error: last(&traces.integral_time_absolute_error),
    };
    (scalars, traces)
}

/// Metrics restricted to one `[t0, t1]` window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowedMetrics {
    pub xwin: (f64, f64),
    pub raw: IntegralErrors,
    pub normalized: IntegralErrors,
}

/// Raw and normalised integral errors, plus one bundle per window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardMetrics {
    pub raw: IntegralErrors,
    pub normalized: IntegralErrors,
    pub windowed: Vec<WindowedMetrics>,
    pub raw_traces: IntegralTraces,
    pub normalized_traces: IntegralTraces,
}

/// Raw metrics of `err(x)`, and normalised ones of `norm * err` over
/// `xnorm * x`, repeated for each window in `xwin`.
pub fn calculate_standard_metrics(
    x: &[f64],
    err: &[f64],
    norm: f64,
    xnorm: f64,
    xwin: &[(f64, f64)],
) -> StandardMetrics {
    let xn: Vec<f64> = x.iter().map(|v| v * xnorm).collect();
    let en: Vec<f64> = err.iter().map(|v| v * norm).collect();
    let (raw, raw_traces) = calc_standard_metrics(x, err);
    let (normalized, normalized_traces) = calc_standard_metrics(&xn, &en);

    let windowed = xwin
        .iter()
        .map(|&(t0, t1)| {
            let w: Vec<usize> = (0..x.len()).filter(|&i| x[i] >= t0 && x[i] <= t1).collect();
            let pick = |v: &[f64]| -> Vec<f64> { w.iter().map(|&i| v[i]).collect() };
            WindowedMetrics {
                xwin: (t0, t1),
                raw: calc_standard_metrics(&pick(x), &pick(err)).0,
                normalized: calc_standard_metrics(&pick(&xn), &pick(&en)).0,
            }
        })
        .collect();
    StandardMetrics {
        raw,
        normalized,
        windowed,
        raw_traces,
        normalized_traces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::linspace;

    #[test]
    fn constant_error_integrals() {
        let x = linspace(0.0, 2.0, 21);
        let err = vec![-3.0; 21];
        let (m, h) = calc_standard_metrics(&x, &err);
        assert!((m.integral_square_error - 18.0).abs() < 1e-12);
        assert!((m.integral_absolute_error - 6.0).abs() < 1e-12);
        // int_0^2 3 t dt
        assert!((m.integral_time_absolute_error - 6.0).abs() < 1e-12);
        assert_eq!(h.integral_absolute_error[0], 0.0);
    }

    #[test]
    fn missing_samples_are_skipped() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let err = [1.0, f64::NAN, 1.0, 1.0];
        let (m, h) = calc_standard_metrics(&x, &err);
        assert!((m.integral_absolute_error - 3.0).abs() < 1e-12);
        assert!(h.integral_absolute_error[1].is_nan());
    }

    #[test]
    fn trailing_nan_makes_the_scalar_nan() {
        let (m, _) = calc_standard_metrics(&[0.0, 1.0, 2.0], &[1.0, 1.0, f64::NAN]);
        assert!(m.integral_square_error.is_nan());
    }
}
