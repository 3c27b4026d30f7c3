//! Initial parameter guesses and bounds.

use crate::error::{FitError, FitRes};
use ca_core::{Shots, diff, nanmax, nanmean, nanmin, nanptp};
use ca_models::{ModelParameters, ParamName, Parameter};
use ca_signal::stats::{take, valid_indices};
use std::iter::repeat_n;
use tracing::debug;

/// Default damping guess for second and third order models.
pub const DAMPING_GUESS: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FirstOrderGuess {
    pub y0: f64,
    pub gain: f64,
    pub lag: f64,
    pub scale: f64,
}

impl FirstOrderGuess {
    pub fn to_vec(self) -> Vec<f64> {
        vec![self.y0, self.gain, self.lag, self.scale]
    }
}

/// Heuristic first order guess for a single series.
///
/// - gain: `range(y) / range(u)`, negative when y and u move in opposite
///   directions from their first samples
/// - lag: peak of the overlap-normalised cross-correlation of edge-padded
///   `u` and `y`, at least `max(dx, 2.5% of range(x))`
/// - scale: a quarter of `smoothing_scale`
/// - y0: the extreme of y on the side it starts from
pub fn make_first_order_guess(
    x: &[f64],
    u: &[f64],
    y: &[f64],
    smoothing_scale: f64,
) -> FitRes<FirstOrderGuess> {
    let n = x.len();
    if n < 2 || u.len() != n || y.len() != n {
        return Err(FitError::InvalidArg {
            what: "first order guess needs at least two samples of x, u and y",
        });
    }
    let du = nanptp(u);
    let dy = nanptp(y);
    let mut gain = if du > 0.0 { dy / du } else { 0.0 };
    if (nanmean(y) > y[0]) != (nanmean(u) > u[0]) {
        gain = -gain;
    }

    let dx = nanmean(&diff(x));
    let lag = correlation_lag(x, u, y, dx).max(dx).max(0.025 * nanptp(x));

    let scale = 0.25 * smoothing_scale;
    let y0 = if y[n - 1] > y[0] { nanmin(y) } else { nanmax(y) };
    Ok(FirstOrderGuess {
        y0,
        gain,
        lag,
        scale,
    })
}

/// Shift of `y` behind `u` that maximises their cross-correlation.
///
/// Both series are padded with `n` copies of their end values on each side
/// and the correlation at each shift is divided by the number of overlapping
/// samples.
fn correlation_lag(x: &[f64], u: &[f64], y: &[f64], dx: f64) -> f64 {
    let n = x.len();
    let pad = |v: &[f64]| -> Vec<f64> {
        repeat_n(v[0], n)
            .chain(v.iter().copied())
            .chain(repeat_n(v[n - 1], n))
            .collect()
    };
    let u2 = pad(u);
    let y2 = pad(y);
    let x2: Vec<f64> = (0..n)
        .rev()
        .map(|k| x[0] - k as f64 * dx)
        .chain(x.iter().copied())
        .chain((0..n).map(|k| x[n - 1] + k as f64 * dx))
        .collect();

    let m = x2.len() as i64;
    let mut best = f64::NEG_INFINITY;
    let mut lag = 0.0;
    for s in -(m - 1)..m {
        let lo = (-s).max(0);
        let hi = m.min(m - s);
        let c: f64 = (lo..hi)
            .map(|j| u2[(j + s) as usize] * y2[j as usize])
            .sum::<f64>()
            / (hi - lo) as f64;
        if c > best {
            best = c;
            lag = if s <= 0 {
                x2[(-s) as usize] - x2[0]
            } else {
                x2[0] - x2[s as usize]
            };
        }
    }
    lag
}

/// Average of per-shot first order guesses.
///
/// The gain magnitude is the mean of the per-shot magnitudes and its sign
/// comes from the signed mean, since the sign is the less reliable part.
fn multi_shot_guess(x: &Shots, u: &Shots, y: &Shots, smoothing_scale: f64) -> FitRes<FirstOrderGuess> {
    let mut guesses = Vec::with_capacity(y.n_shots());
    for i in 0..y.n_shots() {
        let (xi, ui, yi) = (x.shot_or_first(i), u.shot_or_first(i), y.shot(i));
        let sel = valid_indices(&[xi, ui, yi]);
        if sel.len() < 2 {
            debug!(shot = i, "not enough valid samples for a guess; skipping shot");
            continue;
        }
        guesses.push(make_first_order_guess(
            &take(xi, &sel),
            &take(ui, &sel),
            &take(yi, &sel),
            smoothing_scale,
        )?);
    }
    if guesses.is_empty() {
        return Err(FitError::InvalidArg {
            what: "no shot has enough valid samples to guess from",
        });
    }
    let mean = |f: fn(&FirstOrderGuess) -> f64| nanmean(&guesses.iter().map(f).collect::<Vec<_>>());
    let gain = mean(|g| g.gain);
    Ok(FirstOrderGuess {
        y0: mean(|g| g.y0),
        gain: mean(|g| g.gain.abs()) * gain.signum(),
        lag: mean(|g| g.lag),
        scale: mean(|g| g.scale),
    })
}

/// Build the parameter set for a model of `order`.
///
/// Missing entries of `guess` (layout `[y0, gain, lag, scale, damping?,
/// d_gain_du]`) are filled from the heuristic. Returns the completed guess
/// vector and the bounded parameters.
#[allow(clippy::too_many_arguments)]
pub fn make_guess(
    x: &Shots,
    y: &Shots,
    u: &Shots,
    order: i64,
    guess: &[Option<f64>],
    variable_gain: bool,
    modified_y: bool,
    smoothing_scale: f64,
) -> FitRes<(Vec<f64>, ModelParameters)> {
    if !(1..=3).contains(&order) {
        return Err(FitError::UnsupportedOrder { order });
    }
    y.check_compatible(x, "guess x")?;
    y.check_compatible(u, "guess u")?;

    let n_guess = if order > 1 { 6 } else { 5 };
    let complete = guess.len() >= n_guess && guess.iter().all(Option::is_some);
    let mut filled: Vec<f64> = guess.iter().map(|g| g.unwrap_or(f64::NAN)).collect();
    if !complete {
        let mut heuristic = multi_shot_guess(x, u, y, smoothing_scale)?.to_vec();
        if order > 1 {
            heuristic.push(DAMPING_GUESS);
        }
        heuristic.push(0.0);
        filled.resize(filled.len().max(heuristic.len()), f64::NAN);
        for (v, h) in filled.iter_mut().zip(&heuristic) {
            if v.is_nan() {
                *v = *h;
            }
        }
    }
    debug!(?filled, order, "processed guess");

    let (ymin, ymax) = (nanmin(y.as_flat()), nanmax(y.as_flat()));
    let dy = ymax - ymin;
    let dx = nanptp(x.as_flat());
    let du = nanptp(u.as_flat());

    let mut params = ModelParameters::new();
    params.add(Parameter::bounded(ParamName::Y0, filled[0], ymin - dy, ymax + dy));
    params.add(if du > 0.0 {
        let g = 10.0 * dy / du;
        Parameter::bounded(ParamName::Gain, filled[1], -g, g)
    } else {
        Parameter::free(ParamName::Gain, filled[1])
    });
    params.add(Parameter::bounded(ParamName::Lag, filled[2], 0.0, 0.9 * dx));
    params.add(Parameter::bounded(ParamName::Scale, filled[3], 0.0, 0.9 * dx));
    if order > 1 {
        params.add(Parameter::bounded(ParamName::Damping, filled[4], 0.0, 100.0));
    }
    if order > 2 {
        params.add(Parameter::free(ParamName::A3, 1.0));
    }
    params.add(if variable_gain {
        Parameter::free(ParamName::DGainDu, filled[n_guess - 1])
    } else {
        Parameter::fixed(ParamName::DGainDu, 0.0)
    });
    params.add(Parameter {
        vary: modified_y,
        ..Parameter::free(ParamName::Ex, 0.0)
    });
    Ok((filled, params))
}
