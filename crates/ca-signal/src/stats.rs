//! Integration, interpolation, derivative and correlation helpers.

use ca_core::{NanPolicy, Real};

/// Trapezoid integral of `y` over `x`.
pub fn trapz(y: &[Real], x: &[Real]) -> Real {
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yw, xw)| 0.5 * (yw[0] + yw[1]) * (xw[1] - xw[0]))
        .sum()
}

/// Cumulative trapezoid integral, starting at 0.
pub fn cumtrapz(y: &[Real], x: &[Real]) -> Vec<Real> {
    let mut out = Vec::with_capacity(y.len());
    let mut acc = 0.0;
    if !y.is_empty() {
        out.push(0.0);
    }
    for (yw, xw) in y.windows(2).zip(x.windows(2)) {
        acc += 0.5 * (yw[0] + yw[1]) * (xw[1] - xw[0]);
        out.push(acc);
    }
    out
}

/// Average of `y` weighted by the trapezoid rule on `x`.
///
/// End points carry half weight, so this is the plain mean only when the end
/// values average to the interior mean (linear `y` on a uniform grid, say).
/// Without `x`, unit spacing is assumed. With [`NanPolicy::Ignore`], samples
/// where either `x` or `y` is NaN are dropped first.
pub fn mean_trapz(y: &[Real], x: Option<&[Real]>, nan_policy: NanPolicy) -> Real {
    let index: Vec<Real>;
    let x = match x {
        Some(x) => x,
        None => {
            index = (0..y.len()).map(|i| i as Real).collect();
            &index
        }
    };
    let (x2, y2): (Vec<Real>, Vec<Real>) = match nan_policy {
        NanPolicy::Ignore => x
            .iter()
            .zip(y)
            .filter(|(xi, yi)| !xi.is_nan() && !yi.is_nan())
            .map(|(&xi, &yi)| (xi, yi))
            .unzip(),
        NanPolicy::Propagate => (x.to_vec(), y.to_vec()),
    };
    let ones = vec![1.0; y2.len()];
    trapz(&y2, &x2) / trapz(&ones, &x2)
}

/// Out-of-range behaviour for [`interp1d`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Extrapolate {
    /// Hold the first/last value
    Edge,
    /// Use a constant
    Fill(Real),
}

/// Linear interpolation of `(x, y)` at `xo`. `x` must be ascending.
pub fn interp1d(x: &[Real], y: &[Real], xo: &[Real], extrapolate: Extrapolate) -> Vec<Real> {
    xo.iter().map(|&v| interp_one(x, y, v, extrapolate)).collect()
}

pub(crate) fn interp_one(x: &[Real], y: &[Real], v: Real, extrapolate: Extrapolate) -> Real {
    let n = x.len().min(y.len());
    if n == 0 || v.is_nan() {
        return Real::NAN;
    }
    if v < x[0] || v > x[n - 1] {
        return match extrapolate {
            Extrapolate::Edge if v < x[0] => y[0],
            Extrapolate::Edge => y[n - 1],
            Extrapolate::Fill(f) => f,
        };
    }
    // first index with x[j] >= v
    let j = x[..n].partition_point(|&xi| xi < v);
    if j == 0 || x[j] == v {
        return y[j];
    }
    let (x0, x1) = (x[j - 1], x[j]);
    let t = (v - x0) / (x1 - x0);
    y[j - 1] + t * (y[j] - y[j - 1])
}

/// Derivative of the 3-point Lagrange interpolating polynomial through `y(x)`.
///
/// One-sided stencils at the ends. Fewer than three points fall back to a
/// plain difference.
pub fn deriv(x: &[Real], y: &[Real]) -> Vec<Real> {
    let n = x.len().min(y.len());
    match n {
        0 => return Vec::new(),
        1 => return vec![0.0],
        2 => {
            let d = (y[1] - y[0]) / (x[1] - x[0]);
            return vec![d, d];
        }
        _ => {}
    }
    let dlip = |ra: Real, r: [Real; 3], f: [Real; 3]| {
        let [r1, r2, r3] = r;
        let [f1, f2, f3] = f;
        ((ra - r1) + (ra - r2)) / (r3 - r1) / (r3 - r2) * f3
            + ((ra - r1) + (ra - r3)) / (r2 - r1) / (r2 - r3) * f2
            + ((ra - r2) + (ra - r3)) / (r1 - r2) / (r1 - r3) * f1
    };
    let mut out = Vec::with_capacity(n);
    out.push(dlip(x[0], [x[0], x[1], x[2]], [y[0], y[1], y[2]]));
    for i in 1..n - 1 {
        out.push(dlip(x[i], [x[i - 1], x[i], x[i + 1]], [y[i - 1], y[i], y[i + 1]]));
    }
    out.push(dlip(
        x[n - 1],
        [x[n - 3], x[n - 2], x[n - 1]],
        [y[n - 3], y[n - 2], y[n - 1]],
    ));
    out
}

/// Pearson correlation coefficient over samples where both inputs are finite.
///
/// NaN when fewer than two samples remain or either input has zero variance.
pub fn corrcoef(a: &[Real], b: &[Real]) -> Real {
    let pairs: Vec<(Real, Real)> = a
        .iter()
        .zip(b)
        .filter(|(p, q)| p.is_finite() && q.is_finite())
        .map(|(&p, &q)| (p, q))
        .collect();
    if pairs.len() < 2 {
        return Real::NAN;
    }
    let n = pairs.len() as Real;
    let ma = pairs.iter().map(|p| p.0).sum::<Real>() / n;
    let mb = pairs.iter().map(|p| p.1).sum::<Real>() / n;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (p, q) in &pairs {
        sab += (p - ma) * (q - mb);
        saa += (p - ma).powi(2);
        sbb += (q - mb).powi(2);
    }
    if saa == 0.0 || sbb == 0.0 {
        return Real::NAN;
    }
    sab / (saa * sbb).sqrt()
}

/// Indices where none of the given series is NaN.
pub fn valid_indices(series: &[&[Real]]) -> Vec<usize> {
    let n = series.iter().map(|s| s.len()).min().unwrap_or(0);
    (0..n)
        .filter(|&i| series.iter().all(|s| !s[i].is_nan()))
        .collect()
}

pub fn take(v: &[Real], idx: &[usize]) -> Vec<Real> {
    idx.iter().map(|&i| v[i]).collect()
}
