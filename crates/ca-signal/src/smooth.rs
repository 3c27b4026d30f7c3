//! Smoothing dispatcher.
//!
//! Every method maps `(x, y)` to a smoothed `y` of the same length. With
//! `causal` set, output sample `i` depends only on inputs `0..=i`.

use crate::butter::butter_smooth;
use crate::error::{SignalError, SignalResult};
use crate::window::WindowFunction;
use ca_core::{diff, median_in_place, nanmean, nanmedian};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest median-filter window accepted before the cost guard trips.
pub const DEFAULT_MEDIAN_FILTER_MAX_STEPS: usize = 3503;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Smoother {
    /// Continuous-kernel convolution; copes with non-uniform x
    #[serde(rename = "smooth_by_convolution")]
    SmoothByConvolution,
    /// Discrete moving average with a named window (near-uniform x)
    #[serde(rename = "smooth")]
    MovingAverage,
    /// First-order Butterworth low-pass with cutoff 1/scale
    #[default]
    #[serde(rename = "butter_smooth")]
    Butterworth,
    /// Running median
    #[serde(rename = "median_filter")]
    MedianFilter,
    /// Convolution with a triangle kernel of half-width `scale`
    #[serde(rename = "trismooth")]
    TriSmooth,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmoothSettings {
    pub method: Smoother,
    pub scale: f64,
    pub window_function: WindowFunction,
    pub causal: bool,
    pub median_filter_max_steps: usize,
}

impl SmoothSettings {
    pub fn new(method: Smoother, scale: f64) -> Self {
        Self {
            method,
            scale,
            window_function: WindowFunction::default(),
            causal: false,
            median_filter_max_steps: DEFAULT_MEDIAN_FILTER_MAX_STEPS,
        }
    }

    pub fn causal(mut self, causal: bool) -> Self {
        self.causal = causal;
        self
    }

    pub fn window(mut self, window_function: WindowFunction) -> Self {
        self.window_function = window_function;
        self
    }

    /// Same settings with a different scale.
    pub fn with_scale(&self, scale: f64) -> Self {
        Self {
            scale,
            ..self.clone()
        }
    }
}

/// Smooth `y(x)` with the configured method.
pub fn smooth(x: &[f64], y: &[f64], settings: &SmoothSettings) -> SignalResult<Vec<f64>> {
    if x.len() != y.len() {
        return Err(SignalError::Core(ca_core::CaError::LengthMismatch {
            what: "smooth y",
            expected: x.len(),
            got: y.len(),
        }));
    }
    if !(settings.scale > 0.0) {
        return Err(SignalError::InvalidArg {
            what: "smoothing scale must be positive",
        });
    }
    let s = settings.scale;
    match settings.method {
        Smoother::SmoothByConvolution => Ok(smooth_by_convolution(
            x,
            y,
            s,
            settings.window_function,
            settings.causal,
        )),
        Smoother::MovingAverage => {
            let window_len = (s / nanmean(&diff(x))).ceil() as usize;
            if settings.causal {
                Ok(causal_moving_average(y, window_len, settings.window_function))
            } else {
                moving_average(y, window_len, settings.window_function)
            }
        }
        Smoother::Butterworth => butter_smooth(x, y, s, settings.causal, 1),
        Smoother::MedianFilter => {
            median_filter(x, y, s, settings.causal, settings.median_filter_max_steps)
        }
        Smoother::TriSmooth => Ok(trismooth(x, y, s, settings.causal)),
    }
}

fn odd(len: usize) -> usize {
    if len % 2 == 0 { len + 1 } else { len }
}

/// Centred moving average with a symmetric window and reflected edges.
///
/// Windows shorter than 3 samples return `y` unchanged.
pub fn moving_average(y: &[f64], window_len: usize, window: WindowFunction) -> SignalResult<Vec<f64>> {
    if window_len < 3 {
        return Ok(y.to_vec());
    }
    let m = odd(window_len);
    let n = y.len();
    if n < m {
        return Err(SignalError::WindowTooLong { window: m, len: n });
    }
    let w = window.discrete(m);
    let wsum: f64 = w.iter().sum();
    let h = (m - 1) / 2;
    let reflect = |q: isize| -> f64 {
        let last = n as isize - 1;
        let idx = if q < 0 {
            -q
        } else if q > last {
            2 * last - q
        } else {
            q
        };
        y[idx as usize]
    };
    Ok((0..n as isize)
        .map(|i| {
            w.iter()
                .enumerate()
                .map(|(k, wk)| wk * reflect(i + k as isize - h as isize))
                .sum::<f64>()
                / wsum
        })
        .collect())
}

/// Trailing half of the symmetric window applied to past samples only.
/// Samples before the start are taken as `y[0]`.
fn causal_moving_average(y: &[f64], window_len: usize, window: WindowFunction) -> Vec<f64> {
    if window_len < 3 || y.is_empty() {
        return y.to_vec();
    }
    let m = odd(window_len);
    let h = (m - 1) / 2;
    let w = window.discrete(m);
    // w[h] weights the current sample, w[h + j] the sample j steps back
    let half = &w[h..];
    (0..y.len())
        .map(|i| {
            let mut acc = 0.0;
            let mut norm = 0.0;
            for (j, wj) in half.iter().enumerate() {
                let v = if j <= i { y[i - j] } else { y[0] };
                acc += wj * v;
                norm += wj;
            }
            if norm > 0.0 { acc / norm } else { y[i] }
        })
        .collect()
}

/// Convolution of `y(x)` with a continuous kernel, evaluated back on `x`.
///
/// NaN samples are dropped. Each output is the trapezoid integral of kernel
/// times data over the samples inside the window, normalized by the
/// trapezoid integral of the kernel alone. An empty window yields NaN and a
/// window holding one sample returns that sample.
pub fn smooth_by_convolution(
    x: &[f64],
    y: &[f64],
    window_size: f64,
    window: WindowFunction,
    causal: bool,
) -> Vec<f64> {
    let keep: Vec<usize> = (0..x.len().min(y.len()))
        .filter(|&i| !x[i].is_nan() && !y[i].is_nan())
        .collect();
    let xi: Vec<f64> = keep.iter().map(|&i| x[i]).collect();
    let yi: Vec<f64> = keep.iter().map(|&i| y[i]).collect();
    if xi.is_empty() {
        debug!("smooth_by_convolution: zero length input");
        return vec![f64::NAN; x.len()];
    }
    let reach = window_size * window.support_multiplier() / 2.0;
    x.iter()
        .map(|&xo| {
            if xo.is_nan() {
                return f64::NAN;
            }
            let sel: Vec<usize> = (0..xi.len())
                .filter(|&j| {
                    let d = xo - xi[j];
                    if causal { (0.0..=reach).contains(&d) } else { d.abs() <= reach }
                })
                .collect();
            match sel.len() {
                0 => f64::NAN,
                1 => yi[sel[0]],
                _ => {
                    let ff: Vec<f64> = sel
                        .iter()
                        .map(|&j| {
                            let d = xo - xi[j];
                            let f = window.kernel(d, window_size);
                            if causal && d < 0.0 { 0.0 } else { f }
                        })
                        .collect();
                    let mut norm = 0.0;
                    let mut acc = 0.0;
                    for k in 0..sel.len() - 1 {
                        let dx = xi[sel[k] + 1] - xi[sel[k]];
                        norm += 0.5 * (ff[k] + ff[k + 1]) * dx;
                        acc += 0.5 * (ff[k] * yi[sel[k]] + ff[k + 1] * yi[sel[k + 1]]) * dx;
                    }
                    if norm == 0.0 { f64::NAN } else { acc / norm }
                }
            }
        })
        .collect()
}

/// Triangle-kernel smoothing with half-width `window_size`.
pub fn trismooth(x: &[f64], y: &[f64], window_size: f64, causal: bool) -> Vec<f64> {
    smooth_by_convolution(x, y, window_size, WindowFunction::Triangle, causal)
}

/// Running median over `ceil(scale / median(dx) / 2) * 2 + 1` samples.
///
/// Acausal filtering pads each end with the median of the nearest half-window
/// so the edges are not dragged toward the pad. Causal filtering uses a
/// trailing window padded with `y[0]`.
pub fn median_filter(
    x: &[f64],
    y: &[f64],
    scale: f64,
    causal: bool,
    max_steps: usize,
) -> SignalResult<Vec<f64>> {
    let dxm = nanmedian(&diff(x));
    let steps = ((scale / dxm / 2.0).ceil() * 2.0 + 1.0) as usize;
    if steps > max_steps {
        let max_scale = (max_steps as f64 - 1.0) * dxm;
        return Err(SignalError::BadInputValue {
            what: format!(
                "too many steps ({steps}) for median filter with timescale {scale} and data sampled every {dxm}"
            ),
            max_scale,
        });
    }
    let n = y.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let padlen = steps / 2;
    debug!(steps, padlen, causal, "median_filter");
    let mut buf = Vec::with_capacity(steps);
    let mut window_median = |vals: &mut dyn Iterator<Item = f64>| {
        buf.clear();
        buf.extend(vals.filter(|v| !v.is_nan()));
        median_in_place(&mut buf)
    };
    if causal {
        return Ok((0..n)
            .map(|i| {
                let mut it = (0..steps).map(|k| {
                    let back = steps - 1 - k;
                    if back <= i { y[i - back] } else { y[0] }
                });
                window_median(&mut it)
            })
            .collect());
    }
    let front = nanmedian(&y[..padlen.min(n)]);
    let back = nanmedian(&y[n - padlen.min(n)..]);
    let mut ymod = Vec::with_capacity(n + 2 * padlen);
    ymod.extend(std::iter::repeat_n(front, padlen));
    ymod.extend_from_slice(y);
    ymod.extend(std::iter::repeat_n(back, padlen));
    Ok((0..n)
        .map(|i| window_median(&mut ymod[i..i + steps].iter().copied()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::linspace;

    fn step(x: &[f64]) -> Vec<f64> {
        x.iter().map(|&t| if t >= 5.0 { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn every_method_keeps_length_and_constants() {
        let x = linspace(0.0, 10.0, 101);
        let y = vec![2.5; 101];
        for method in [
            Smoother::SmoothByConvolution,
            Smoother::MovingAverage,
            Smoother::Butterworth,
            Smoother::MedianFilter,
            Smoother::TriSmooth,
        ] {
            for causal in [false, true] {
                let st = SmoothSettings::new(method, 0.5).causal(causal);
                let out = smooth(&x, &y, &st).unwrap();
                assert_eq!(out.len(), 101);
                assert!(
                    out.iter().all(|v| (v - 2.5).abs() < 1e-9),
                    "{method:?} causal={causal}"
                );
            }
        }
    }

    #[test]
    fn acausal_smoothing_is_symmetric_about_a_step() {
        let x = linspace(0.0, 10.0, 201);
        let y = step(&x);
        let out = smooth(&x, &y, &SmoothSettings::new(Smoother::SmoothByConvolution, 1.0)).unwrap();
        // value at the step is midway
        assert!((out[100] - 0.5).abs() < 0.1);
        assert!(out[80] < 0.05 && out[120] > 0.95);
    }

    #[test]
    fn causal_output_lags() {
        let x = linspace(0.0, 10.0, 201);
        let y = step(&x);
        let st = SmoothSettings::new(Smoother::MovingAverage, 1.0).causal(true);
        let out = smooth(&x, &y, &st).unwrap();
        assert!(out[99].abs() < 1e-12);
        assert!(out[100] > 0.0 && out[100] < 0.5);
    }

    #[test]
    fn median_filter_rejects_costly_window() {
        let x = linspace(0.0, 10.0, 1001);
        let y = vec![0.0; 1001];
        let mut st = SmoothSettings::new(Smoother::MedianFilter, 5.0);
        st.median_filter_max_steps = 101;
        match smooth(&x, &y, &st) {
            Err(SignalError::BadInputValue { max_scale, .. }) => {
                assert!((max_scale - 1.0).abs() < 1e-9);
            }
            other => panic!("expected BadInputValue, got {other:?}"),
        }
    }

    #[test]
    fn median_filter_removes_spike() {
        let x = linspace(0.0, 10.0, 101);
        let mut y = vec![1.0; 101];
        y[50] = 100.0;
        let out = smooth(&x, &y, &SmoothSettings::new(Smoother::MedianFilter, 0.3)).unwrap();
        assert!((out[50] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn convolution_handles_nan_and_uneven_x() {
        let x = [0.0, 0.1, 0.3, 0.35, 0.9, 1.0];
        let y = [1.0, f64::NAN, 1.0, 1.0, 1.0, 1.0];
        let out = smooth_by_convolution(&x, &y, 0.5, WindowFunction::Gaussian, false);
        assert!(out.iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        let x = linspace(0.0, 1.0, 10);
        let y = vec![0.0; 10];
        assert!(smooth(&x, &y, &SmoothSettings::new(Smoother::Butterworth, 0.0)).is_err());
    }

    #[test]
    fn moving_average_window_too_long() {
        let y = vec![0.0; 4];
        assert!(matches!(
            moving_average(&y, 9, WindowFunction::Hanning),
            Err(SignalError::WindowTooLong { window: 9, len: 4 })
        ));
    }
}
