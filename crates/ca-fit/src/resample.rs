//! Resampling onto a uniform fit grid.

use crate::error::{FitError, FitRes};
use ca_core::{Shots, linspace, nanmax, nanmin};
use ca_signal::stats::{take, valid_indices};
use ca_signal::{Extrapolate, interp1d};
use serde::{Deserialize, Serialize};

/// Fit inputs on the uniform grid.
///
/// `x`, `y`, `u` and `y_err` keep NaN outside each shot's support. The
/// `*c` copies have those samples (any of x, y or u NaN) replaced by zero,
/// which the models read as the end of the series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitInputs {
    pub x: Shots,
    pub y: Shots,
    pub u: Shots,
    pub y_err: Option<Shots>,
    pub xc: Shots,
    pub yc: Shots,
    pub uc: Shots,
    pub y_errc: Option<Shots>,
    /// Column-major flag per sample, true where the data are missing
    pub mask: Vec<bool>,
}

/// Interpolate every shot onto `linspace(min x, max x, min(n, npts))`.
///
/// Only downsamples: the grid never has more points than the input.
pub fn resample(
    x: &Shots,
    y: &Shots,
    u: &Shots,
    y_err: Option<&Shots>,
    npts: usize,
) -> FitRes<FitInputs> {
    y.check_compatible(x, "resample x")?;
    y.check_compatible(u, "resample u")?;
    if let Some(e) = y_err {
        y.check_compatible(e, "resample y_err")?;
    }
    if npts < 2 || y.n_samples() < 2 {
        return Err(FitError::InvalidArg {
            what: "resampling needs at least two points",
        });
    }
    let npts2 = y.n_samples().min(npts);
    let xnew = linspace(nanmin(x.as_flat()), nanmax(x.as_flat()), npts2);
    let nan = Extrapolate::Fill(f64::NAN);

    let n_shots = y.n_shots();
    let (mut yi, mut ui, mut ei) = (Vec::new(), Vec::new(), Vec::new());
    for i in 0..n_shots {
        let xs = x.shot_or_first(i);
        let ys = y.shot(i);
        let sel = valid_indices(&[xs, ys]);
        let xv = take(xs, &sel);
        yi.push(interp1d(&xv, &take(ys, &sel), &xnew, nan));
        ui.push(interp1d(&xv, &take(u.shot_or_first(i), &sel), &xnew, nan));
        if let Some(e) = y_err {
            ei.push(interp1d(&xv, &take(e.shot_or_first(i), &sel), &xnew, nan));
        }
    }
    let x = Shots::from_columns(vec![xnew; n_shots])?;
    let y = Shots::from_columns(yi)?;
    let u = Shots::from_columns(ui)?;
    let y_err = if y_err.is_some() {
        Some(Shots::from_columns(ei)?)
    } else {
        None
    };

    let mask: Vec<bool> = x
        .as_flat()
        .iter()
        .zip(y.as_flat())
        .zip(u.as_flat())
        .map(|((a, b), c)| a.is_nan() || b.is_nan() || c.is_nan())
        .collect();
    let zero_fill = |s: &Shots| -> FitRes<Shots> {
        let cols = s
            .shots()
            .enumerate()
            .map(|(i, col)| {
                col.iter()
                    .enumerate()
                    .map(|(j, &v)| if mask[i * s.n_samples() + j] { 0.0 } else { v })
                    .collect()
            })
            .collect();
        Ok(Shots::from_columns(cols)?)
    };
    let xc = zero_fill(&x)?;
    let yc = zero_fill(&y)?;
    let uc = zero_fill(&u)?;
    let y_errc = y_err.as_ref().map(zero_fill).transpose()?;
    Ok(FitInputs {
        x,
        y,
        u,
        y_err,
        xc,
        yc,
        uc,
        y_errc,
        mask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsamples_but_never_upsamples() {
        let x = Shots::single(linspace(0.0, 1.0, 11));
        let y = x.map_values(|v| 2.0 * v);
        let r = resample(&x, &y, &y, None, 6).unwrap();
        assert_eq!(r.x.n_samples(), 6);
        assert!((r.y.shot(0)[3] - 1.2).abs() < 1e-12);
        let r = resample(&x, &y, &y, None, 100).unwrap();
        assert_eq!(r.x.n_samples(), 11);
        assert!(r.mask.iter().all(|m| !m));
    }

    #[test]
    fn short_shots_are_masked_and_zero_filled() {
        let x = Shots::from_columns(vec![linspace(0.0, 10.0, 11), linspace(0.0, 5.0, 6)]).unwrap();
        let y = x.map_values(|v| v + 1.0);
        let e = x.map_values(|_| 0.1);
        let r = resample(&x, &y, &y, Some(&e), 11).unwrap();
        assert_eq!(r.y.n_shots(), 2);
        let short = r.y.shot(1);
        assert!((short[5] - 6.0).abs() < 1e-12);
        assert!(short[6].is_nan());
        assert_eq!(r.yc.shot(1)[6], 0.0);
        assert_eq!(r.xc.shot(1)[6], 0.0);
        assert_eq!(r.y_errc.as_ref().unwrap().shot(1)[8], 0.0);
        assert!(r.mask[11 + 6] && !r.mask[11 + 5]);
        // the full shot is untouched
        assert_eq!(r.xc.shot(0), r.x.shot(0));
    }
}
