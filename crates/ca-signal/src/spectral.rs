//! FFT-based tools: automatic smoothing scale, Hilbert envelope and
//! periodic-noise removal.

use crate::error::{SignalError, SignalResult};
use crate::smooth::moving_average;
use crate::stats::{Extrapolate, interp1d};
use crate::window::WindowFunction;
use ca_core::{diff, nanmean, nanmedian};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use tracing::debug;

fn fft(values: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut buf = values.to_vec();
    if buf.is_empty() {
        return buf;
    }
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(buf.len()).process(&mut buf);
    buf
}

fn ifft(values: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut buf = values.to_vec();
    if buf.is_empty() {
        return buf;
    }
    let n = buf.len() as f64;
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_inverse(buf.len()).process(&mut buf);
    for c in &mut buf {
        *c /= n;
    }
    buf
}

fn to_complex(y: &[f64]) -> Vec<Complex<f64>> {
    y.iter().map(|&v| Complex::new(v, 0.0)).collect()
}

/// Sample frequencies in standard FFT order.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let nf = n as f64;
    (0..n)
        .map(|i| {
            let k = if i < n.div_ceil(2) { i as f64 } else { i as f64 - nf };
            k / (nf * d)
        })
        .collect()
}

/// Move the zero-frequency bin to the centre.
pub fn fftshift<T: Clone>(v: &[T]) -> Vec<T> {
    let mut out = v.to_vec();
    out.rotate_right(v.len() / 2);
    out
}

/// Inverse of [`fftshift`].
pub fn ifftshift<T: Clone>(v: &[T]) -> Vec<T> {
    let mut out = v.to_vec();
    out.rotate_left(v.len() / 2);
    out
}

/// Pick a smoothing scale from where the low-frequency content of `y` drops
/// out of its spectrum.
///
/// The scale is `1/f` for the first non-zero frequency whose smoothed,
/// normalized spectral power falls to 10% of the peak. NaN for empty input.
pub fn auto_scale(x: &[f64], y: &[f64]) -> f64 {
    let nx = x.len();
    if nx == 0 {
        return f64::NAN;
    }
    let nfft = 1usize << ((nx as f64).log2().floor() as u32 + 1);
    let dx = nanmean(&diff(x));
    let ym = nanmean(y);

    let mut padded = vec![Complex::new(0.0, 0.0); nfft];
    for (p, &v) in padded.iter_mut().zip(y) {
        *p = Complex::new(if v.is_nan() { 0.0 } else { v - ym }, 0.0);
    }
    let spec = fft(&padded);
    let nr = nfft / 2 + 1;
    let freq: Vec<f64> = (0..nr).map(|k| k as f64 / (nfft as f64 * dx)).collect();
    let rf: Vec<f64> = spec[..nr].iter().map(|c| c.re * c.re).collect();

    let win = 11.min(nx / 2);
    let mut rf = moving_average(&rf, win, WindowFunction::Hanning).unwrap_or(rf);
    let peak = rf.iter().cloned().fold(f64::NAN, f64::max);
    if peak > 0.0 {
        for v in &mut rf {
            *v /= peak;
        }
    }
    let fs = freq
        .iter()
        .zip(&rf)
        .skip(1)
        .find(|(_, r)| **r <= 0.1)
        .map(|(f, _)| *f)
        .unwrap_or(freq[nr - 1]);
    debug!(nfft, dx, fs, "auto_scale");
    1.0 / fs
}

/// Amplitude envelope `|analytic(y)|` computed through the FFT.
pub fn hilbert_envelope(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    if n == 0 {
        return Vec::new();
    }
    let mut spec = fft(&to_complex(y));
    let mut h = vec![0.0; n];
    h[0] = 1.0;
    if n % 2 == 0 {
        h[n / 2] = 1.0;
        h[1..n / 2].iter_mut().for_each(|v| *v = 2.0);
    } else {
        h[1..n.div_ceil(2)].iter_mut().for_each(|v| *v = 2.0);
    }
    for (c, hv) in spec.iter_mut().zip(&h) {
        *c *= *hv;
    }
    ifft(&spec).iter().map(|c| c.norm()).collect()
}

/// Lower cutoff used when characterising the baseline noise.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum MinFreq {
    /// Twice the baseline frequency resolution
    #[default]
    Auto,
    Value(f64),
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PeriodicNoiseRemoval {
    /// `y` with the periodic noise removed
    pub cleaned: Vec<f64>,
    /// What was removed, `y - cleaned`
    pub noise: Vec<f64>,
}

/// Remove periodic noise from `y(x)` by learning its spectrum in a
/// signal-free baseline interval.
///
/// Components of the baseline spectrum weaker than `amp_threshold` times the
/// strongest (DC excluded, weighted by frequency) are ignored; the remaining
/// frequencies are zeroed in the full signal's spectrum.
pub fn remove_periodic_noise(
    x: &[f64],
    y: &[f64],
    baseline_interval: (f64, f64),
    amp_threshold: f64,
    min_freq: MinFreq,
    max_freq: Option<f64>,
) -> SignalResult<PeriodicNoiseRemoval> {
    let (t0, t1) = baseline_interval;
    let sel: Vec<usize> = (0..x.len().min(y.len()))
        .filter(|&i| x[i] >= t0 && x[i] <= t1)
        .collect();
    if sel.len() < 2 {
        return Err(SignalError::InvalidArg {
            what: "baseline interval must contain at least two samples",
        });
    }
    let x1: Vec<f64> = sel.iter().map(|&i| x[i]).collect();
    let y1: Vec<f64> = sel.iter().map(|&i| y[i]).collect();
    let dx = nanmedian(&diff(&x1));
    let fr = fftfreq(y1.len(), dx);
    let mut fclean = fft(&to_complex(&y1));

    let min_freq = match min_freq {
        MinFreq::Auto => Some(2.0 * (fr[1] - fr[0])),
        MinFreq::Value(v) => Some(v),
        MinFreq::None => None,
    };
    for (c, f) in fclean.iter_mut().zip(&fr) {
        let below = min_freq.is_some_and(|m| f.abs() < m);
        let above = max_freq.is_some_and(|m| f.abs() > m);
        if below || above {
            *c = Complex::new(0.0, 0.0);
        }
    }
    let fnorm = fclean
        .iter()
        .zip(&fr)
        .filter(|(_, f)| **f != 0.0)
        .map(|(c, f)| c.norm() * f.abs())
        .fold(0.0, f64::max);
    for (c, f) in fclean.iter_mut().zip(&fr) {
        if c.norm() * f.abs() < fnorm * amp_threshold {
            *c = Complex::new(0.0, 0.0);
        }
    }

    let fmagc: Vec<f64> = fclean.iter().map(|c| c.norm()).collect();
    let mut fall = fft(&to_complex(y));
    let frall = fftfreq(y.len(), dx);
    let mask = ifftshift(&interp1d(
        &fftshift(&fr),
        &fftshift(&fmagc),
        &fftshift(&frall),
        Extrapolate::Fill(0.0),
    ));
    let mut removed = 0usize;
    for (c, m) in fall.iter_mut().zip(&mask) {
        if *m > 0.0 {
            *c = Complex::new(0.0, 0.0);
            removed += 1;
        }
    }
    debug!(fnorm, removed, "remove_periodic_noise");
    let cleaned: Vec<f64> = ifft(&fall).iter().map(|c| c.re).collect();
    let noise = y.iter().zip(&cleaned).map(|(a, b)| a - b).collect();
    Ok(PeriodicNoiseRemoval { cleaned, noise })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::linspace;
    use std::f64::consts::PI;

    #[test]
    fn fftfreq_layout() {
        let f = fftfreq(4, 0.5);
        assert_eq!(f, vec![0.0, 0.5, -1.0, -0.5]);
        let f = fftfreq(5, 1.0);
        assert!((f[2] - 0.4).abs() < 1e-12 && (f[3] + 0.4).abs() < 1e-12);
        assert_eq!(ifftshift(&fftshift(&f)), f);
    }

    #[test]
    fn auto_scale_follows_x_units() {
        let x = linspace(0.0, 10.0, 500);
        let y: Vec<f64> = x
            .iter()
            .map(|t| if *t > 2.0 { 1.0 - (-(t - 2.0) / 0.7).exp() } else { 0.0 })
            .collect();
        let s = auto_scale(&x, &y);
        assert!(s.is_finite() && s > 0.0);
        let x_ms: Vec<f64> = x.iter().map(|t| 1000.0 * t).collect();
        let s_ms = auto_scale(&x_ms, &y);
        assert!((s_ms / s - 1000.0).abs() < 1e-6);
        assert!(auto_scale(&[], &[]).is_nan());
    }

    #[test]
    fn envelope_of_sine_is_flat() {
        let n = 512;
        let y: Vec<f64> = (0..n)
            .map(|i| 2.0 * (2.0 * PI * 32.0 * i as f64 / n as f64).sin())
            .collect();
        let env = hilbert_envelope(&y);
        for v in &env[20..n - 20] {
            assert!((v - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn periodic_noise_is_removed() {
        // baseline [0, 10) holds only the 2 Hz hum; a slow ramp starts later
        let x = linspace(0.0, 20.0, 2000);
        let dx = x[1] - x[0];
        let hum: Vec<f64> = x.iter().map(|t| 0.5 * (2.0 * PI * 2.0 * t).sin()).collect();
        let ramp: Vec<f64> = x.iter().map(|t| if *t > 10.0 { 0.1 * (t - 10.0) } else { 0.0 }).collect();
        let y: Vec<f64> = hum.iter().zip(&ramp).map(|(a, b)| a + b).collect();
        let out = remove_periodic_noise(&x, &y, (0.0, 10.0 - dx), 0.1, MinFreq::Auto, None).unwrap();
        let resid = |v: &[f64]| {
            (v[200..1800].iter().zip(&ramp[200..1800]).map(|(a, b)| (a - b).powi(2)).sum::<f64>() / 1600.0).sqrt()
        };
        assert!(resid(&out.cleaned) < 0.5 * resid(&y));
        assert_eq!(out.noise.len(), y.len());
    }

    #[test]
    fn empty_baseline_is_an_error() {
        let x = linspace(0.0, 1.0, 10);
        let y = vec![0.0; 10];
        assert!(remove_periodic_noise(&x, &y, (5.0, 6.0), 0.1, MinFreq::Auto, None).is_err());
    }
}
