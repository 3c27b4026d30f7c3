//! Derivative-free minimisation with argmin's Nelder-Mead solver.

use crate::error::{FitError, FitRes};
use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use tracing::debug;

/// Nelder-Mead configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct NelderMeadConfig {
    /// Iteration cap for each run
    pub max_iters: u64,
    /// Stop once the standard deviation of the simplex costs drops below this
    pub sd_tolerance: f64,
    /// Relative size of the initial simplex
    pub initial_step: f64,
    /// Step used for coordinates that start at zero
    pub zero_step: f64,
    /// Extra runs restarted from the best point found so far
    pub restarts: usize,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            sd_tolerance: 1e-10,
            initial_step: 0.05,
            zero_step: 0.00025,
            restarts: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Minimum {
    pub param: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
    pub cost_evals: u64,
    pub converged: bool,
    pub message: String,
}

struct Objective<'a, F> {
    f: &'a F,
}

impl<F> CostFunction for Objective<'_, F>
where
    F: Fn(&[f64]) -> FitRes<f64>,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok((self.f)(p.as_slice())?)
    }
}

fn initial_simplex(p0: &[f64], cfg: &NelderMeadConfig) -> Vec<Vec<f64>> {
    let mut simplex = vec![p0.to_vec()];
    for i in 0..p0.len() {
        let mut v = p0.to_vec();
        v[i] = if v[i] != 0.0 {
            v[i] * (1.0 + cfg.initial_step)
        } else {
            cfg.zero_step
        };
        simplex.push(v);
    }
    simplex
}

/// Minimise `f` starting from `p0`.
///
/// After the first run the solver is restarted from the best point with a
/// fresh simplex, up to `cfg.restarts` times or until the cost stops
/// improving. With no free coordinates `f` is evaluated once.
pub fn minimize<F>(f: &F, p0: &[f64], cfg: &NelderMeadConfig) -> FitRes<Minimum>
where
    F: Fn(&[f64]) -> FitRes<f64>,
{
    if p0.is_empty() {
        return Ok(Minimum {
            param: Vec::new(),
            cost: f(p0)?,
            iterations: 0,
            cost_evals: 1,
            converged: true,
            message: "No free parameters".to_string(),
        });
    }

    let mut best = p0.to_vec();
    let mut best_cost = f(p0)?;
    let mut iterations = 0;
    let mut cost_evals = 1;
    let mut status = TerminationStatus::NotTerminated;

    for run in 0..=cfg.restarts {
        let solver = NelderMead::new(initial_simplex(&best, cfg)).with_sd_tolerance(cfg.sd_tolerance)?;
        let res = Executor::new(Objective { f }, solver)
            .configure(|state| state.max_iters(cfg.max_iters))
            .run()?;
        let state = res.state();
        iterations += state.get_iter();
        cost_evals += state.get_func_counts().get("cost_count").copied().unwrap_or(0);
        status = state.get_termination_status().clone();

        let cost = state.get_best_cost();
        let improved = cost < best_cost;
        let gain = best_cost - cost;
        if improved && let Some(p) = state.get_best_param() {
            best = p.clone();
            best_cost = cost;
        }
        debug!(run, cost, best_cost, ?status, "nelder-mead run finished");
        if !improved || gain <= cfg.sd_tolerance * best_cost.abs().max(1.0) {
            break;
        }
    }

    if !best_cost.is_finite() {
        return Err(FitError::Optimizer {
            what: format!("no finite cost found (best = {best_cost})"),
        });
    }
    let converged = matches!(
        status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );
    Ok(Minimum {
        param: best,
        cost: best_cost,
        iterations,
        cost_evals,
        converged,
        message: describe(&status),
    })
}

fn describe(status: &TerminationStatus) -> String {
    match status {
        TerminationStatus::Terminated(TerminationReason::SolverConverged) => {
            "Optimization terminated successfully.".to_string()
        }
        TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
            "Maximum number of iterations has been exceeded.".to_string()
        }
        other => format!("{other:?}"),
    }
}
