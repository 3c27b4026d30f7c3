//! Residuals between data and a model, and model evaluation on a grid.

use crate::error::FitRes;
use ca_core::Shots;
use ca_models::{ModelOrder, ModelParameters, simulate};
use ca_signal::stats::{take, valid_indices};

/// `(y - model) / y_err` for every shot.
///
/// Each shot is simulated over its rows where x, y and u are all present;
/// the remaining rows get a zero residual. Where `y_err` is zero or NaN the
/// residual is zero.
pub fn model_residual(
    params: &ModelParameters,
    order: ModelOrder,
    x: &Shots,
    u: &Shots,
    y: &Shots,
    y_err: Option<&Shots>,
    uniform_dx: bool,
) -> FitRes<Shots> {
    y.check_compatible(x, "residual x")?;
    y.check_compatible(u, "residual u")?;
    let n = y.n_samples();
    let mut cols = Vec::with_capacity(y.n_shots());
    for i in 0..y.n_shots() {
        let (xs, us, ys) = (x.shot_or_first(i), u.shot_or_first(i), y.shot(i));
        let sel = valid_indices(&[xs, ys, us]);
        let yi = take(ys, &sel);
        let model = simulate(order, &take(xs, &sel), &take(us, &sel), params, uniform_dx)?;
        let mut col = vec![0.0; n];
        for ((&row, yv), mv) in sel.iter().zip(&yi).zip(&model) {
            col[row] = yv - mv;
        }
        if let Some(e) = y_err {
            for (r, &err) in col.iter_mut().zip(e.shot_or_first(i)) {
                *r = if err == 0.0 || err.is_nan() { 0.0 } else { *r / err };
            }
        }
        cols.push(col);
    }
    Ok(Shots::from_columns(cols)?)
}

/// The model on the grid of `x`, NaN wherever x or u is missing.
pub fn evaluate_model(
    params: &ModelParameters,
    order: ModelOrder,
    x: &Shots,
    u: &Shots,
    uniform_dx: bool,
) -> FitRes<Shots> {
    u.check_compatible(x, "model x")?;
    let n = u.n_samples();
    let mut cols = Vec::with_capacity(u.n_shots());
    for i in 0..u.n_shots() {
        let (xs, us) = (x.shot_or_first(i), u.shot(i));
        let sel = valid_indices(&[xs, us]);
        let model = simulate(order, &take(xs, &sel), &take(us, &sel), params, uniform_dx)?;
        let mut col = vec![f64::NAN; n];
        for (&row, mv) in sel.iter().zip(model) {
            col[row] = mv;
        }
        cols.push(col);
    }
    Ok(Shots::from_columns(cols)?)
}
