//! Window functions, in two flavours:
//!
//! - discrete symmetric windows of `M` samples, used by the moving-average smoother
//! - continuous kernels `f(dx, a)` evaluated at arbitrary offsets, used by
//!   convolution on non-uniform grids

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    Gaussian,
    #[default]
    #[serde(alias = "hann")]
    Hanning,
    Bartlett,
    Blackman,
    #[serde(alias = "flat")]
    Boxcar,
    #[serde(alias = "triang")]
    Triangle,
}

impl WindowFunction {
    /// Symmetric window of `m` samples.
    pub fn discrete(self, m: usize) -> Vec<f64> {
        if m == 0 {
            return Vec::new();
        }
        if m == 1 {
            return vec![1.0];
        }
        let mm = (m - 1) as f64;
        let center = 0.5 * mm;
        (0..m)
            .map(|n| {
                let n = n as f64;
                match self {
                    WindowFunction::Hanning => 0.5 - 0.5 * (2.0 * PI * n / mm).cos(),
                    WindowFunction::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * n / mm).cos() + 0.08 * (4.0 * PI * n / mm).cos()
                    }
                    WindowFunction::Bartlett => 1.0 - (n - center).abs() / center,
                    WindowFunction::Triangle => {
                        let half = if m % 2 == 1 { 0.5 * (m as f64 + 1.0) } else { 0.5 * m as f64 };
                        1.0 - (n - center).abs() / half
                    }
                    WindowFunction::Boxcar => 1.0,
                    WindowFunction::Gaussian => {
                        let sigma = mm / 8.0;
                        (-0.5 * ((n - center) / sigma).powi(2)).exp()
                    }
                }
            })
            .collect()
    }

    /// Continuous kernel evaluated at offset `x` for window size `a`.
    ///
    /// Not normalized; callers normalize by the trapezoid integral of the
    /// kernel over the samples actually used.
    pub fn kernel(self, x: f64, a: f64) -> f64 {
        let inside = x.abs() <= 0.5 * a;
        match self {
            WindowFunction::Gaussian => {
                let sigma = a / 4.0;
                (-0.5 * (x / sigma).powi(2)).exp() / sigma / (2.0 * PI).sqrt()
            }
            WindowFunction::Hanning if inside => (1.0 - (2.0 * PI * (x - 0.5 * a) / a).cos()) / a,
            WindowFunction::Bartlett if inside => 1.0 - 2.0 * x.abs() / a,
            WindowFunction::Blackman if inside => {
                let p = (x + 0.5 * a) / a;
                0.42 - 0.5 * (2.0 * PI * p).cos() + 0.08 * (4.0 * PI * p).cos()
            }
            WindowFunction::Boxcar if inside => 1.0 / a,
            WindowFunction::Triangle if a >= x.abs() => 1.0 - (x / a).abs(),
            _ => 0.0,
        }
    }

    /// Width of the support in units of the window size.
    pub fn support_multiplier(self) -> f64 {
        match self {
            WindowFunction::Gaussian | WindowFunction::Triangle => 2.0,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hanning_is_symmetric_with_zero_ends() {
        let w = WindowFunction::Hanning.discrete(7);
        assert!(w[0].abs() < 1e-12 && w[6].abs() < 1e-12);
        assert!((w[3] - 1.0).abs() < 1e-12);
        for i in 0..7 {
            assert!((w[i] - w[6 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn triangle_odd_has_nonzero_ends() {
        let w = WindowFunction::Triangle.discrete(5);
        assert!((w[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((w[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kernels_vanish_outside_support() {
        for wf in [
            WindowFunction::Hanning,
            WindowFunction::Bartlett,
            WindowFunction::Blackman,
            WindowFunction::Boxcar,
        ] {
            assert_eq!(wf.kernel(0.6, 1.0), 0.0);
            assert!(wf.kernel(0.0, 1.0) > 0.0);
        }
        assert!(WindowFunction::Triangle.kernel(0.9, 1.0) > 0.0);
        assert_eq!(WindowFunction::Triangle.kernel(1.1, 1.0), 0.0);
    }

    #[test]
    fn names_parse_from_yaml() {
        let wf: WindowFunction = serde_yaml::from_str("hann").unwrap();
        assert_eq!(wf, WindowFunction::Hanning);
    }
}
