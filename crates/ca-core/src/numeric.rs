use crate::CaError;

/// Floating point type used throughout the workspace
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CaError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CaError::NonFinite { what, value: v })
    }
}

/// How NaN samples are treated by reductions and integrals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NanPolicy {
    /// Drop samples where any input is NaN
    #[default]
    Ignore,
    /// Keep NaN samples; results become NaN
    Propagate,
}

fn finite_values(v: &[Real]) -> impl Iterator<Item = Real> + '_ {
    v.iter().copied().filter(|x| !x.is_nan())
}

/// Mean of the non-NaN values. NaN if there are none.
pub fn nanmean(v: &[Real]) -> Real {
    let (sum, n) = finite_values(v).fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    if n == 0 { Real::NAN } else { sum / n as Real }
}

/// Population standard deviation of the non-NaN values.
pub fn nanstd(v: &[Real]) -> Real {
    let m = nanmean(v);
    if m.is_nan() {
        return Real::NAN;
    }
    let (ss, n) = finite_values(v).fold((0.0, 0usize), |(s, n), x| (s + (x - m).powi(2), n + 1));
    (ss / n as Real).sqrt()
}

/// Median of the non-NaN values (average of the two middle values for even counts).
pub fn nanmedian(v: &[Real]) -> Real {
    let mut vals: Vec<Real> = finite_values(v).collect();
    median_in_place(&mut vals)
}

/// Median of a NaN-free buffer. Reorders the buffer.
pub fn median_in_place(vals: &mut [Real]) -> Real {
    let n = vals.len();
    if n == 0 {
        return Real::NAN;
    }
    vals.sort_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        vals[n / 2]
    } else {
        0.5 * (vals[n / 2 - 1] + vals[n / 2])
    }
}

pub fn nanmin(v: &[Real]) -> Real {
    finite_values(v).fold(Real::NAN, |acc, x| if acc.is_nan() || x < acc { x } else { acc })
}

pub fn nanmax(v: &[Real]) -> Real {
    finite_values(v).fold(Real::NAN, |acc, x| if acc.is_nan() || x > acc { x } else { acc })
}

/// Peak-to-peak range of the non-NaN values.
pub fn nanptp(v: &[Real]) -> Real {
    nanmax(v) - nanmin(v)
}

pub fn linspace(start: Real, stop: Real, n: usize) -> Vec<Real> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as Real;
            (0..n).map(|i| start + step * i as Real).collect()
        }
    }
}

/// First differences.
pub fn diff(v: &[Real]) -> Vec<Real> {
    v.windows(2).map(|w| w[1] - w[0]).collect()
}

/// True when every spacing of `x` matches the first one within `tol`.
pub fn is_uniform(x: &[Real], tol: Tolerances) -> bool {
    let d = diff(x);
    match d.first() {
        None => true,
        Some(&d0) => d.iter().all(|&di| nearly_equal(di, d0, tol)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn nan_reductions_skip_nan() {
        let v = [1.0, Real::NAN, 3.0, 5.0];
        assert!((nanmean(&v) - 3.0).abs() < 1e-12);
        assert!((nanmedian(&v) - 3.0).abs() < 1e-12);
        assert!((nanptp(&v) - 4.0).abs() < 1e-12);
        assert!(nanmean(&[Real::NAN]).is_nan());
    }

    #[test]
    fn even_median_averages_middle() {
        assert!((nanmedian(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn linspace_endpoints() {
        let x = linspace(0.0, 10.0, 201);
        assert_eq!(x.len(), 201);
        assert!((x[200] - 10.0).abs() < 1e-12);
        assert!(is_uniform(&x, Tolerances { abs: 1e-9, rel: 1e-6 }));
        assert!(!is_uniform(&[0.0, 1.0, 3.0], Tolerances::default()));
    }
}
