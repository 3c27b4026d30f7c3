//! Plus-dead-time response models.
//!
//! All models start at `y0` and step forward explicitly. The input seen at
//! each step is `u` delayed by `lag`: on a uniform grid the delay is a whole
//! number of samples, otherwise `u` is interpolated with its end values held.
//! Integration stops at the first non-increasing `x` (the start of NaN/zero
//! padding) and the remaining output is zero.

use crate::error::{ModelError, ModelResult};
use crate::params::{Coefficients, ModelParameters};
use ca_signal::{Extrapolate, interp1d};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ModelOrder {
    First = 1,
    Second = 2,
    Third = 3,
}

impl ModelOrder {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for ModelOrder {
    type Error = ModelError;

    fn try_from(order: i64) -> Result<Self, Self::Error> {
        match order {
            1 => Ok(ModelOrder::First),
            2 => Ok(ModelOrder::Second),
            3 => Ok(ModelOrder::Third),
            _ => Err(ModelError::UnsupportedOrder { order }),
        }
    }
}

impl From<ModelOrder> for i64 {
    fn from(o: ModelOrder) -> i64 {
        o as i64
    }
}

/// Length of the strictly increasing prefix of `x`.
fn increasing_len(x: &[f64]) -> usize {
    (1..x.len()).find(|&i| !(x[i] > x[i - 1])).unwrap_or(x.len())
}

/// Delayed input relative to the reference `u0`.
struct LaggedInput<'a> {
    u: &'a [f64],
    x: &'a [f64],
    lag: f64,
    u0: f64,
    uniform: bool,
}

impl<'a> LaggedInput<'a> {
    fn new(x: &'a [f64], u: &'a [f64], lag: f64, u0: Option<f64>, uniform: bool) -> Self {
        let m = increasing_len(x).min(u.len());
        Self {
            u,
            x: &x[..m],
            lag,
            u0: u0.unwrap_or_else(|| u.first().copied().unwrap_or(0.0)),
            uniform,
        }
    }

    /// `u(x[i_ref] - lag) - u0`, with `dx` the local grid step.
    fn du(&self, i_ref: usize, dx: f64) -> f64 {
        let v = if self.uniform {
            let shift = (self.lag / dx).round() as i64;
            let idu = (i_ref as i64 - shift).clamp(0, self.u.len() as i64 - 1);
            self.u[idu as usize]
        } else {
            let n = self.x.len();
            interp1d(
                self.x,
                &self.u[..n],
                &[self.x[i_ref.min(n - 1)] - self.lag],
                Extrapolate::Edge,
            )[0]
        };
        v - self.u0
    }
}

/// `y^(1/(1+ex)) * y0^(ex/(1+ex))`; identity when `ex == 0`.
pub fn output_transform(y: &mut [f64], y0: f64, ex: f64) {
    if ex == 0.0 {
        return;
    }
    let p = 1.0 / (1.0 + ex);
    let k = y0.powf(ex / (1.0 + ex));
    for v in y.iter_mut() {
        *v = v.powf(p) * k;
    }
}

/// First order plus dead time: `scale dy/dx = -(y - y0) + g_eff du`.
pub fn first_order(x: &[f64], u: &[f64], c: &Coefficients, uniform_dx: bool) -> Vec<f64> {
    let n = x.len().min(u.len());
    let mut y = vec![c.y0; n];
    if n == 0 {
        return y;
    }
    let input = LaggedInput::new(x, u, c.lag, c.u0, uniform_dx);
    for i in 1..n {
        if x[i] <= x[i - 1] {
            y[i..].fill(0.0);
            break;
        }
        let dx = x[i] - x[i - 1];
        let du = input.du(i - 1, dx);
        let geff = c.gain + c.d_gain_du * du;
        let dydt = -((y[i - 1] - c.y0) - geff * du) / c.scale;
        y[i] = y[i - 1] + dydt * dx;
    }
    output_transform(&mut y, c.y0, c.ex);
    y
}

/// Second order plus dead time:
/// `d2y/dx2 = (g_eff du - (y - y0)) / scale^2 - 2 damping / scale dy/dx`.
pub fn second_order(x: &[f64], u: &[f64], c: &Coefficients, uniform_dx: bool) -> Vec<f64> {
    let n = x.len().min(u.len());
    let mut y = vec![c.y0; n];
    let mut dydt = vec![0.0; n];
    let input = LaggedInput::new(x, u, c.lag, c.u0, uniform_dx);
    for i in 2..n {
        if x[i] <= x[i - 1] {
            y[i..].fill(0.0);
            break;
        }
        let dx_prev = x[i - 1] - x[i - 2];
        let du = input.du(i - 2, dx_prev);
        let geff = c.gain + c.d_gain_du * du;
        let d2 = (geff * du - (y[i - 2] - c.y0)) / c.scale.powi(2)
            - 2.0 * c.damping / c.scale * dydt[i - 2];
        dydt[i - 1] = dydt[i - 2] + d2 * dx_prev;
        y[i] = y[i - 1] + dydt[i - 1] * (x[i] - x[i - 1]);
    }
    output_transform(&mut y, c.y0, c.ex);
    y
}

/// Third order plus dead time. This discretisation is not a standard
/// system-identification model; every call logs a warning.
///
/// `d3y = a3 ((g_eff du - (y - y0)) / scale^3 - 2 damping / scale^2 dy + d2y / scale)`
pub fn third_order(x: &[f64], u: &[f64], c: &Coefficients, uniform_dx: bool) -> Vec<f64> {
    warn!("third order model is non-standard; treat its results with caution");
    let n = x.len().min(u.len());
    let mut y = vec![c.y0; n];
    let mut dydt = vec![0.0; n];
    let mut d2ydt2 = vec![0.0; n];
    let input = LaggedInput::new(x, u, c.lag, c.u0, uniform_dx);
    for i in 3..n {
        if x[i] <= x[i - 1] {
            y[i..].fill(0.0);
            break;
        }
        let du = input.du(i - 2, x[i - 1] - x[i - 2]);
        let geff = c.gain + c.d_gain_du * du;
        let term1 = (geff * du - (y[i - 3] - c.y0)) / c.scale.powi(3);
        let term2 = -2.0 * c.damping / c.scale.powi(2) * dydt[i - 3];
        let term3 = d2ydt2[i - 3] / c.scale;
        let d3 = c.a3 * (term1 + term2 + term3);
        d2ydt2[i - 2] = d2ydt2[i - 3] + d3 * (x[i - 2] - x[i - 3]);
        dydt[i - 1] = dydt[i - 2] + d2ydt2[i - 2] * (x[i - 1] - x[i - 2]);
        y[i] = y[i - 1] + dydt[i - 1] * (x[i] - x[i - 1]);
    }
    output_transform(&mut y, c.y0, c.ex);
    y
}

/// Run the model of `order` with coefficients taken from `params`.
pub fn simulate(
    order: ModelOrder,
    x: &[f64],
    u: &[f64],
    params: &ModelParameters,
    uniform_dx: bool,
) -> ModelResult<Vec<f64>> {
    let c = Coefficients::from_params(params, order.as_u8())?;
    Ok(match order {
        ModelOrder::First => first_order(x, u, &c, uniform_dx),
        ModelOrder::Second => second_order(x, u, &c, uniform_dx),
        ModelOrder::Third => third_order(x, u, &c, uniform_dx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::linspace;

    fn step_input(x: &[f64], at: f64) -> Vec<f64> {
        x.iter().map(|&t| if t >= at { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn fopdt_settles_at_y0_plus_gain_du() {
        let x = linspace(0.0, 50.0, 5001);
        let u = step_input(&x, 5.0);
        let c = Coefficients::first_order(3.0, 2.0, 1.0, 2.0);
        let y = first_order(&x, &u, &c, true);
        assert!((y[5000] - 5.0).abs() < 1e-3);
        // nothing happens before the step has propagated through the lag
        let before = x.iter().position(|&t| t > 5.9).unwrap();
        assert!(y[..before].iter().all(|&v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn uniform_and_interpolated_lag_agree() {
        let x = linspace(0.0, 20.0, 2001);
        let u = step_input(&x, 2.0);
        let c = Coefficients::first_order(0.0, 1.5, 0.5, 1.0);
        let a = first_order(&x, &u, &c, true);
        let b = first_order(&x, &u, &c, false);
        for (p, q) in a.iter().zip(&b) {
            assert!((p - q).abs() < 0.02);
        }
    }

    #[test]
    fn padding_zeroes_the_tail() {
        let mut x = linspace(0.0, 5.0, 51);
        x.extend([0.0; 10]);
        let u = vec![1.0; 61];
        let c = Coefficients::second_order(1.0, 1.0, 0.0, 1.0, 0.5);
        let y = second_order(&x, &u, &c, true);
        assert_eq!(y.len(), 61);
        assert!(y[51..].iter().all(|&v| v == 0.0));
        assert!(y[50] > 0.0);
    }

    #[test]
    fn underdamped_second_order_overshoots_as_expected() {
        let x = linspace(0.0, 30.0, 30001);
        let u = step_input(&x, 1.0);
        let c = Coefficients::second_order(0.0, 1.0, 0.0, 1.0, 0.3);
        let y = second_order(&x, &u, &c, true);
        let peak = y.iter().cloned().fold(f64::MIN, f64::max);
        // 100 exp(-pi d / sqrt(1 - d^2)) = 37.2% for d = 0.3
        assert!((peak - 1.372).abs() < 0.01, "peak {peak}");
        assert!((y[30000] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn third_order_holds_steady_without_input_change() {
        let x = linspace(0.0, 10.0, 101);
        let u = vec![4.0; 101];
        let c = Coefficients {
            a3: 1.0,
            ..Coefficients::second_order(2.0, 3.0, 0.2, 1.0, 0.6)
        };
        let y = third_order(&x, &u, &c, true);
        assert!(y.iter().all(|&v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn third_order_starts_moving_after_three_samples() {
        let x = linspace(0.0, 10.0, 101);
        let mut u = vec![1.0; 101];
        u[0] = 0.0;
        let c = Coefficients {
            a3: 1.0,
            ..Coefficients::second_order(0.0, 1.0, 0.0, 1.0, 0.6)
        };
        let y = third_order(&x, &u, &c, true);
        assert_eq!(&y[..3], &[0.0; 3]);
        assert!(y[3] > 0.0);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn output_transform_matches_formula() {
        let mut y = vec![9.0];
        output_transform(&mut y, 4.0, 1.0);
        assert!((y[0] - 6.0).abs() < 1e-12);
        let mut z = vec![-1.0, 3.0];
        output_transform(&mut z, 5.0, 0.0);
        assert_eq!(z, vec![-1.0, 3.0]);
    }

    #[test]
    fn order_parsing() {
        assert_eq!(ModelOrder::try_from(2), Ok(ModelOrder::Second));
        assert_eq!(
            ModelOrder::try_from(0),
            Err(ModelError::UnsupportedOrder { order: 0 })
        );
        assert!(ModelOrder::try_from(4).is_err());
    }
}
