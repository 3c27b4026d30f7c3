//! Digital Butterworth filters.
//!
//! The design is a cascade of second-order sections (plus one first-order
//! section for odd orders) obtained from the analog prototype through the
//! bilinear transform with frequency prewarping. Each section runs in direct
//! form II transposed.
//!
//! Behaviour follows scipy.signal: `design` matches `butter(order, wn,
//! output="sos")`, `lfilter_steady` matches `sosfilt` started from
//! `sosfilt_zi * x[0]`, and `filtfilt` matches `filtfilt(b, a, x)` with its
//! defaults `padtype="odd"` and `padlen = 3 * (order + 1)`.

use crate::error::{SignalError, SignalResult};
use ca_core::nanmean;
use std::f64::consts::PI;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButterKind {
    LowPass,
    HighPass,
}

/// One biquad section: `b = [b0, b1, b2]`, `a = [1, a1, a2]`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Section {
    b: [f64; 3],
    a: [f64; 2],
}

impl Section {
    fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a[0] + self.a[1];
        if den == 0.0 {
            0.0
        } else {
            (self.b[0] + self.b[1] + self.b[2]) / den
        }
    }

    /// Steady-state delay line for a constant input of 1.
    fn zi(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z2 = self.b[2] - self.a[1] * g;
        let z1 = self.b[1] - self.a[0] * g + z2;
        [z1, z2]
    }

    fn run(&self, x: &mut [f64], mut z: [f64; 2]) {
        for v in x.iter_mut() {
            let xi = *v;
            let yi = self.b[0] * xi + z[0];
            z[0] = self.b[1] * xi - self.a[0] * yi + z[1];
            z[1] = self.b[2] * xi - self.a[1] * yi;
            *v = yi;
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Butterworth {
    order: usize,
    sections: Vec<Section>,
}

impl Butterworth {
    /// Design a filter of `order` with normalized cutoff `wn` (1 = Nyquist).
    pub fn design(order: usize, wn: f64, kind: ButterKind) -> SignalResult<Self> {
        if order == 0 {
            return Err(SignalError::InvalidArg {
                what: "butterworth order must be >= 1",
            });
        }
        if !(wn > 0.0 && wn < 1.0) {
            return Err(SignalError::InvalidArg {
                what: "normalized cutoff must be in (0, 1)",
            });
        }
        let k = (0.5 * PI * wn).tan();
        let k2 = k * k;
        let mut sections = Vec::with_capacity(order.div_ceil(2));
        for i in 0..order / 2 {
            let inv_q = 2.0 * ((2 * i + 1) as f64 * PI / (2 * order) as f64).sin();
            let norm = 1.0 / (1.0 + k * inv_q + k2);
            let a1 = 2.0 * (k2 - 1.0) * norm;
            let a2 = (1.0 - k * inv_q + k2) * norm;
            let b = match kind {
                ButterKind::LowPass => {
                    let b0 = k2 * norm;
                    [b0, 2.0 * b0, b0]
                }
                ButterKind::HighPass => [norm, -2.0 * norm, norm],
            };
            sections.push(Section { b, a: [a1, a2] });
        }
        if order % 2 == 1 {
            let a1 = (k - 1.0) / (k + 1.0);
            let b = match kind {
                ButterKind::LowPass => {
                    let b0 = k / (1.0 + k);
                    [b0, b0, 0.0]
                }
                ButterKind::HighPass => {
                    let b0 = 1.0 / (1.0 + k);
                    [b0, -b0, 0.0]
                }
            };
            sections.push(Section { b, a: [a1, 0.0] });
        }
        Ok(Self { order, sections })
    }

    /// Low-pass smoothing design used by the smoother: cutoff `1/timescale`,
    /// normalized to Nyquist and capped at 0.9.
    pub fn smoothing(x: &[f64], timescale: f64, order: usize) -> SignalResult<Self> {
        let dx = nanmean(&ca_core::diff(x));
        let nyquist = 0.5 / dx;
        let cutoff = 1.0 / timescale;
        let wn = (cutoff / nyquist).min(0.9);
        debug!(nyquist, timescale, cutoff, wn, "butter_smooth");
        Self::design(order, wn, ButterKind::LowPass)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Causal filtering, starting from the steady state for `x[0]`.
    pub fn lfilter_steady(&self, x: &[f64]) -> Vec<f64> {
        let mut y = x.to_vec();
        if let Some(&x0) = x.first() {
            self.cascade(&mut y, x0);
        }
        y
    }

    /// Forward-backward filtering with odd extension at both ends, padded by
    /// `3 * (order + 1)` samples (fewer for short inputs).
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        if n < 2 {
            return x.to_vec();
        }
        let padlen = (3 * (self.order + 1)).min(n - 1);
        let (first, last) = (x[0], x[n - 1]);
        let mut ext = Vec::with_capacity(n + 2 * padlen);
        ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));

        let start = ext[0];
        self.cascade(&mut ext, start);
        ext.reverse();
        let start = ext[0];
        self.cascade(&mut ext, start);
        ext.reverse();
        ext[padlen..padlen + n].to_vec()
    }

    fn cascade(&self, buf: &mut [f64], level: f64) {
        let mut level = level;
        for s in &self.sections {
            let zi = s.zi();
            s.run(buf, [zi[0] * level, zi[1] * level]);
            level *= s.dc_gain();
        }
    }
}

/// Butterworth smoothing of `y(x)` using only the non-NaN samples.
///
/// `causal` selects single-pass filtering (output lags input) over the
/// zero-phase forward-backward pass.
pub fn butter_smooth(x: &[f64], y: &[f64], timescale: f64, causal: bool, order: usize) -> SignalResult<Vec<f64>> {
    let ok: Vec<usize> = (0..y.len().min(x.len()))
        .filter(|&i| !x[i].is_nan() && !y[i].is_nan())
        .collect();
    let mut out = vec![f64::NAN; y.len()];
    if ok.len() < 2 {
        for &i in &ok {
            out[i] = y[i];
        }
        return Ok(out);
    }
    let xs: Vec<f64> = ok.iter().map(|&i| x[i]).collect();
    let ys: Vec<f64> = ok.iter().map(|&i| y[i]).collect();
    let filt = Butterworth::smoothing(&xs, timescale, order)?;
    let smoothed = if causal {
        filt.lfilter_steady(&ys)
    } else {
        filt.filtfilt(&ys)
    };
    for (&i, v) in ok.iter().zip(smoothed) {
        out[i] = v;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(n: usize, cycles: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * cycles * i as f64 / n as f64).sin())
            .collect()
    }

    #[test]
    fn lowpass_passes_constant() {
        for order in 1..=5 {
            let f = Butterworth::design(order, 0.2, ButterKind::LowPass).unwrap();
            let y = f.lfilter_steady(&[3.0; 50]);
            assert!(y.iter().all(|v| (v - 3.0).abs() < 1e-9), "order {order}");
            let y = f.filtfilt(&[3.0; 50]);
            assert!(y.iter().all(|v| (v - 3.0).abs() < 1e-9), "order {order}");
        }
    }

    #[test]
    fn highpass_removes_constant() {
        let f = Butterworth::design(5, 0.1, ButterKind::HighPass).unwrap();
        let y = f.filtfilt(&[2.0; 80]);
        assert!(y.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn lowpass_attenuates_fast_sine() {
        let fast = sine(400, 150.0);
        let f = Butterworth::design(5, 0.1, ButterKind::LowPass).unwrap();
        let y = f.filtfilt(&fast);
        let peak = y[50..350].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak < 0.01, "peak {peak}");
    }

    #[test]
    fn lowpass_keeps_slow_sine() {
        let slow = sine(400, 2.0);
        let f = Butterworth::design(2, 0.3, ButterKind::LowPass).unwrap();
        let y = f.filtfilt(&slow);
        for i in 50..350 {
            assert!((y[i] - slow[i]).abs() < 0.01);
        }
    }

    #[test]
    fn zero_phase_keeps_a_ramp_in_place() {
        let ramp: Vec<f64> = (0..200).map(|i| 0.05 * i as f64).collect();
        let f = Butterworth::design(2, 0.5, ButterKind::LowPass).unwrap();
        let y = f.filtfilt(&ramp);
        // odd padding continues the ramp, so even the edges barely move
        for (i, (a, b)) in y.iter().zip(&ramp).enumerate() {
            assert!((a - b).abs() < 1e-3, "sample {i}: {a} vs {b}");
        }
        for i in 40..160 {
            assert!((y[i] - ramp[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn nan_positions_survive_smoothing() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut y = vec![1.0; 20];
        y[5] = f64::NAN;
        let out = butter_smooth(&x, &y, 3.0, false, 1).unwrap();
        assert!(out[5].is_nan());
        assert!((out[6] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bad_cutoff_rejected() {
        assert!(Butterworth::design(1, 1.2, ButterKind::LowPass).is_err());
        assert!(Butterworth::design(0, 0.5, ButterKind::LowPass).is_err());
    }
}
