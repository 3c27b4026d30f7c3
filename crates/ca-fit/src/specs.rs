//! Time-domain performance specifications of a fitted second order model.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeDomainSpecs {
    pub rise_time: f64,
    /// NaN when the system is not underdamped
    pub peak_time: f64,
    /// Percent overshoot of the step response
    pub overshoot: f64,
    pub settle_time: f64,
}

/// Standard second order step response specs with `omega_n = 1 / scale`.
pub fn time_domain_specs_order_2(damping: f64, scale: f64) -> TimeDomainSpecs {
    let d = damping;
    let omega_n = 1.0 / scale;
    let underdamped = d < 1.0;
    let omega_d = if underdamped { omega_n * (1.0 - d * d).sqrt() } else { 0.0 };
    TimeDomainSpecs {
        rise_time: 1.8 / omega_n,
        peak_time: if underdamped { PI / omega_d } else { f64::NAN },
        overshoot: if (0.0..1.0).contains(&d) {
            100.0 * (-PI * d / (1.0 - d * d).sqrt()).exp()
        } else {
            0.0
        },
        settle_time: 4.6 / (d * omega_n),
    }
}
