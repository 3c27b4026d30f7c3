//! Fitting a response model to measured data.

use crate::error::{FitError, FitRes};
use crate::guess::make_guess;
use crate::optimize::{NelderMeadConfig, minimize};
use crate::resample::{FitInputs, resample};
use crate::residual::{evaluate_model, model_residual};
use crate::specs::{TimeDomainSpecs, time_domain_specs_order_2};
use ca_core::{Shots, units};
use ca_models::{ModelOrder, ModelParameters, ParamName};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default cap on the number of points handed to the optimizer.
pub const DEFAULT_FIT_NPTS: usize = 250;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    #[default]
    #[serde(alias = "nelder")]
    NelderMead,
}

impl FitMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            FitMethod::NelderMead => "nelder",
        }
    }
}

/// What to do when the model produces NaN residuals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitNanPolicy {
    /// Abort the fit with an error
    #[default]
    Raise,
    /// Keep them; the cost becomes infinite so the optimizer moves away
    Propagate,
    /// Leave them out of the sum of squares
    Omit,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitUnits {
    pub x: String,
    pub y: String,
    pub u: String,
}

/// Units of each fitted quantity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamUnits {
    pub y0: String,
    pub gain: String,
    pub lag: String,
    pub scale: String,
    pub damping: Option<String>,
}

impl ParamUnits {
    pub fn new(units: &FitUnits, order: ModelOrder) -> Self {
        Self {
            y0: units.y.clone(),
            gain: units::gain_units(&units.y, &units.u),
            lag: units.x.clone(),
            scale: units.x.clone(),
            damping: (order >= ModelOrder::Second).then(String::new),
        }
    }

    /// Units for a parameter or time-domain spec name.
    pub fn lookup(&self, name: &str) -> &str {
        match name {
            "y0" => &self.y0,
            "gain" => &self.gain,
            "lag" => &self.lag,
            "scale" | "rise_time" | "peak_time" | "settle_time" => &self.scale,
            "overshoot" => "%",
            _ => "",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitStatus {
    pub message: String,
    pub success: bool,
    pub iterations: u64,
    pub cost_evals: u64,
}

/// Everything that controls one fit.
#[derive(Clone, Debug, PartialEq)]
pub struct FitRequest {
    /// Key the result is stored under
    pub name: String,
    pub order: i64,
    /// `[y0, gain, lag, scale, damping?, d_gain_du]`; missing entries are guessed
    pub guess: Vec<Option<f64>>,
    pub npts: usize,
    pub method: FitMethod,
    pub nan_policy: FitNanPolicy,
    /// Gain varies linearly with `u - u0`
    pub variable_gain: bool,
    /// Fit the output transform exponent `ex`
    pub modified_y: bool,
    /// Smoothing scale of the data; sets the scale guess
    pub smoothing_scale: f64,
    pub units: FitUnits,
    /// `u` is a command rather than a target with the units of `y`
    pub u_is_command: bool,
    pub optimizer: NelderMeadConfig,
}

impl FitRequest {
    pub fn new(order: i64, smoothing_scale: f64) -> Self {
        Self {
            name: format!("order_{order}_generic_control_response"),
            order,
            guess: Vec::new(),
            npts: DEFAULT_FIT_NPTS,
            method: FitMethod::default(),
            nan_policy: FitNanPolicy::default(),
            variable_gain: false,
            modified_y: false,
            smoothing_scale,
            units: FitUnits::default(),
            u_is_command: false,
            optimizer: NelderMeadConfig::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_guess(mut self, guess: Vec<Option<f64>>) -> Self {
        self.guess = guess;
        self
    }

    pub fn with_units(mut self, units: FitUnits) -> Self {
        self.units = units;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub name: String,
    pub order: ModelOrder,
    pub params: ModelParameters,
    pub guess: ModelParameters,
    pub guess_vector: Vec<f64>,
    pub inputs: FitInputs,
    /// Best-fit model on the fit grid, NaN where data are missing
    pub model_y: Shots,
    pub guess_y: Shots,
    pub chisqr: f64,
    pub redchi: f64,
    pub ndata: usize,
    pub nvarys: usize,
    pub status: FitStatus,
    pub method: FitMethod,
    pub nan_policy: FitNanPolicy,
    pub npts: usize,
    pub u_is_command: bool,
    pub variable_gain: bool,
    pub modified_y: bool,
    pub units: ParamUnits,
    pub time_domain_specs: Option<TimeDomainSpecs>,
}

impl FitResult {
    pub fn value(&self, name: ParamName) -> Option<f64> {
        self.params.value(name)
    }

    pub fn guess_value(&self, name: ParamName) -> Option<f64> {
        self.guess.value(name)
    }
}

/// Sum of squares and number of counted residuals under `policy`.
fn sum_of_squares(r: &Shots, policy: FitNanPolicy) -> FitRes<(f64, usize)> {
    let vals = r.as_flat();
    let nans = vals.iter().filter(|v| v.is_nan()).count();
    match policy {
        FitNanPolicy::Raise if nans > 0 => Err(FitError::NanResidual {
            count: nans,
            total: vals.len(),
        }),
        FitNanPolicy::Propagate if nans > 0 => Ok((f64::INFINITY, vals.len())),
        _ => Ok((
            vals.iter().filter(|v| !v.is_nan()).map(|v| v * v).sum(),
            vals.len() - nans,
        )),
    }
}

/// Fit a response model of `req.order` to `y(x)` driven by `u(x)`.
///
/// The data are resampled onto a uniform grid of at most `req.npts` points,
/// missing samples are zero-filled for the optimizer, and the sum of squared
/// residuals (weighted by `1/y_err` when given) is minimised.
pub fn fit_response_model(
    x: &Shots,
    y: &Shots,
    u: &Shots,
    y_err: Option<&Shots>,
    req: &FitRequest,
) -> FitRes<FitResult> {
    let order = ModelOrder::try_from(req.order)
        .map_err(|_| FitError::UnsupportedOrder { order: req.order })?;
    let inputs = resample(x, y, u, y_err, req.npts)?;
    debug!(name = %req.name, guess = ?req.guess, "input guess");
    let (guess_vector, g) = make_guess(
        &inputs.x,
        &inputs.y,
        &inputs.u,
        req.order,
        &req.guess,
        req.variable_gain,
        req.modified_y,
        req.smoothing_scale,
    )?;
    let guess_y = evaluate_model(&g, order, &inputs.x, &inputs.u, true)?;

    let residual = |p: &ModelParameters| {
        model_residual(
            p,
            order,
            &inputs.xc,
            &inputs.uc,
            &inputs.yc,
            inputs.y_err.as_ref(),
            true,
        )
    };
    let cost = |internal: &[f64]| -> FitRes<f64> {
        let p = g.with_free_internal(internal)?;
        Ok(sum_of_squares(&residual(&p)?, req.nan_policy)?.0)
    };
    let min = minimize(&cost, &g.free_internal(), &req.optimizer)?;
    let params = g.with_free_internal(&min.param)?;

    let (chisqr, ndata) = sum_of_squares(&residual(&params)?, req.nan_policy)?;
    let nvarys = params.n_free();
    let redchi = chisqr / ndata.saturating_sub(nvarys).max(1) as f64;

    let mut model_y = evaluate_model(&params, order, &inputs.x, &inputs.u, true)?;
    let n = model_y.n_samples();
    for (i, &missing) in inputs.mask.iter().enumerate() {
        if missing {
            model_y.shot_mut(i / n)[i % n] = f64::NAN;
        }
    }

    let time_domain_specs = if order == ModelOrder::Second {
        let d = params.require(ParamName::Damping)?;
        let s = params.require(ParamName::Scale)?;
        Some(time_domain_specs_order_2(d, s))
    } else {
        None
    };
    info!(
        name = %req.name,
        chisqr,
        redchi,
        iterations = min.iterations,
        success = min.converged,
        "fit complete"
    );
    Ok(FitResult {
        name: req.name.clone(),
        order,
        params,
        guess: g,
        guess_vector,
        inputs,
        model_y,
        guess_y,
        chisqr,
        redchi,
        ndata,
        nvarys,
        status: FitStatus {
            message: min.message,
            success: min.converged,
            iterations: min.iterations,
            cost_evals: min.cost_evals,
        },
        method: req.method,
        nan_policy: req.nan_policy,
        npts: req.npts,
        u_is_command: req.u_is_command,
        variable_gain: req.variable_gain,
        modified_y: req.modified_y,
        units: ParamUnits::new(&req.units, order),
        time_domain_specs,
    })
}
