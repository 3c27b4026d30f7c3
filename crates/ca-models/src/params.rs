//! Named model parameters with optional bounds.
//!
//! Bounded parameters are mapped to an unbounded internal coordinate so a
//! derivative-free optimizer can search freely:
//!
//! - both bounds: `internal = asin(2 (x - min) / (max - min) - 1)`
//! - lower only:  `internal = sqrt((x - min + 1)^2 - 1)`
//! - upper only:  `internal = sqrt((max - x + 1)^2 - 1)`
//! - none:        identity

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    Y0,
    Gain,
    Lag,
    Scale,
    Damping,
    A3,
    DGainDu,
    Ex,
    U0,
}

impl ParamName {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamName::Y0 => "y0",
            ParamName::Gain => "gain",
            ParamName::Lag => "lag",
            ParamName::Scale => "scale",
            ParamName::Damping => "damping",
            ParamName::A3 => "a3",
            ParamName::DGainDu => "d_gain_du",
            ParamName::Ex => "ex",
            ParamName::U0 => "u0",
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: ParamName,
    pub value: f64,
    #[serde(with = "lower_bound")]
    pub min: f64,
    #[serde(with = "upper_bound")]
    pub max: f64,
    pub vary: bool,
}

// Infinite bounds are stored as null so JSON round-trips.
macro_rules! bound_serde {
    ($name:ident, $missing:expr) => {
        mod $name {
            use serde::{Deserialize, Deserializer, Serializer};

            pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
                if v.is_finite() {
                    s.serialize_some(v)
                } else {
                    s.serialize_none()
                }
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
                Ok(Option::<f64>::deserialize(d)?.unwrap_or($missing))
            }
        }
    };
}
bound_serde!(lower_bound, f64::NEG_INFINITY);
bound_serde!(upper_bound, f64::INFINITY);

impl Parameter {
    pub fn free(name: ParamName, value: f64) -> Self {
        Self {
            name,
            value,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            vary: true,
        }
    }

    pub fn fixed(name: ParamName, value: f64) -> Self {
        Self {
            vary: false,
            ..Self::free(name, value)
        }
    }

    /// Free parameter limited to `[min, max]`; the value is clamped into range.
    ///
    /// A degenerate or non-finite interval leaves the parameter unbounded on
    /// that side, and an empty interval (`min == max`) fixes it.
    pub fn bounded(name: ParamName, value: f64, min: f64, max: f64) -> Self {
        let min = if min.is_finite() { min } else { f64::NEG_INFINITY };
        let max = if max.is_finite() { max } else { f64::INFINITY };
        if min == max {
            return Self::fixed(name, min);
        }
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        let value = if value.is_finite() {
            value.clamp(min, max)
        } else if min.is_finite() && max.is_finite() {
            0.5 * (min + max)
        } else {
            value
        };
        Self {
            name,
            value,
            min,
            max,
            vary: true,
        }
    }

    pub fn to_internal(&self, value: f64) -> f64 {
        match (self.min.is_finite(), self.max.is_finite()) {
            (true, true) => {
                let arg = 2.0 * (value - self.min) / (self.max - self.min) - 1.0;
                arg.clamp(-1.0, 1.0).asin()
            }
            (true, false) => ((value - self.min + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            (false, true) => ((self.max - value + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            (false, false) => value,
        }
    }

    pub fn from_internal(&self, internal: f64) -> f64 {
        match (self.min.is_finite(), self.max.is_finite()) {
            (true, true) => self.min + (internal.sin() + 1.0) * (self.max - self.min) / 2.0,
            (true, false) => self.min - 1.0 + (internal * internal + 1.0).sqrt(),
            (false, true) => self.max + 1.0 - (internal * internal + 1.0).sqrt(),
            (false, false) => internal,
        }
    }
}

/// Ordered parameter set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    params: Vec<Parameter>,
}

impl ModelParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter, keeping insertion order.
    pub fn add(&mut self, p: Parameter) -> &mut Self {
        match self.params.iter_mut().find(|q| q.name == p.name) {
            Some(q) => *q = p,
            None => self.params.push(p),
        }
        self
    }

    pub fn get(&self, name: ParamName) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: ParamName) -> Option<f64> {
        self.get(name).map(|p| p.value)
    }

    pub fn require(&self, name: ParamName) -> ModelResult<f64> {
        self.value(name).ok_or(ModelError::MissingParameter { name })
    }

    pub fn set_value(&mut self, name: ParamName, value: f64) -> ModelResult<()> {
        let p = self
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or(ModelError::MissingParameter { name })?;
        p.value = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn n_free(&self) -> usize {
        self.params.iter().filter(|p| p.vary).count()
    }

    /// Internal coordinates of the free parameters, in order.
    pub fn free_internal(&self) -> Vec<f64> {
        self.params
            .iter()
            .filter(|p| p.vary)
            .map(|p| p.to_internal(p.value))
            .collect()
    }

    /// Copy with the free parameters set from internal coordinates.
    pub fn with_free_internal(&self, internal: &[f64]) -> ModelResult<Self> {
        if internal.len() != self.n_free() {
            return Err(ModelError::InvalidArg {
                what: "internal vector length must match the number of free parameters",
            });
        }
        let mut out = self.clone();
        let mut it = internal.iter();
        for p in out.params.iter_mut().filter(|p| p.vary) {
            if let Some(&v) = it.next() {
                p.value = p.from_internal(v);
            }
        }
        Ok(out)
    }
}

/// Plain coefficients consumed by the response models.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    pub y0: f64,
    pub gain: f64,
    pub lag: f64,
    pub scale: f64,
    pub damping: f64,
    pub a3: f64,
    pub d_gain_du: f64,
    pub ex: f64,
    /// Reference input; `u[0]` when absent
    pub u0: Option<f64>,
}

impl Coefficients {
    pub fn first_order(y0: f64, gain: f64, lag: f64, scale: f64) -> Self {
        Self {
            y0,
            gain,
            lag,
            scale,
            damping: 0.0,
            a3: 0.0,
            d_gain_du: 0.0,
            ex: 0.0,
            u0: None,
        }
    }

    pub fn second_order(y0: f64, gain: f64, lag: f64, scale: f64, damping: f64) -> Self {
        Self {
            damping,
            ..Self::first_order(y0, gain, lag, scale)
        }
    }

    /// Pull the coefficients a model of `order` needs from a parameter set.
    pub fn from_params(p: &ModelParameters, order: u8) -> ModelResult<Self> {
        let opt = |n| p.value(n).unwrap_or(0.0);
        Ok(Self {
            y0: p.require(ParamName::Y0)?,
            gain: p.require(ParamName::Gain)?,
            lag: p.require(ParamName::Lag)?,
            scale: p.require(ParamName::Scale)?,
            damping: if order >= 2 { p.require(ParamName::Damping)? } else { 0.0 },
            a3: if order >= 3 { p.require(ParamName::A3)? } else { 0.0 },
            d_gain_du: opt(ParamName::DGainDu),
            ex: opt(ParamName::Ex),
            u0: p.value(ParamName::U0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_transform_round_trips_inside_range() {
        let p = Parameter::bounded(ParamName::Lag, 0.3, 0.0, 9.0);
        let back = p.from_internal(p.to_internal(0.3));
        assert!((back - 0.3).abs() < 1e-12);
        // any internal value lands inside the bounds
        for v in [-100.0, -1.0, 0.0, 2.5, 1e6] {
            let x = p.from_internal(v);
            assert!((0.0..=9.0).contains(&x));
        }
    }

    #[test]
    fn one_sided_bounds() {
        let lo = Parameter {
            min: 1.0,
            ..Parameter::free(ParamName::Scale, 3.0)
        };
        assert!((lo.from_internal(lo.to_internal(3.0)) - 3.0).abs() < 1e-12);
        assert!(lo.from_internal(-50.0) >= 1.0);
        let hi = Parameter {
            max: -1.0,
            ..Parameter::free(ParamName::Gain, -4.0)
        };
        assert!((hi.from_internal(hi.to_internal(-4.0)) + 4.0).abs() < 1e-12);
        assert!(hi.from_internal(50.0) <= -1.0);
    }

    #[test]
    fn bounded_clamps_and_fixes_degenerate_range() {
        let p = Parameter::bounded(ParamName::Lag, 12.0, 0.0, 9.0);
        assert_eq!(p.value, 9.0);
        let q = Parameter::bounded(ParamName::Y0, 1.0, 2.0, 2.0);
        assert!(!q.vary);
        assert_eq!(q.value, 2.0);
    }

    #[test]
    fn free_vector_skips_fixed_parameters() {
        let mut ps = ModelParameters::new();
        ps.add(Parameter::free(ParamName::Y0, 1.0))
            .add(Parameter::fixed(ParamName::Ex, 0.0))
            .add(Parameter::bounded(ParamName::Scale, 2.0, 0.0, 10.0));
        assert_eq!(ps.n_free(), 2);
        let internal = ps.free_internal();
        let moved = ps.with_free_internal(&[5.0, internal[1]]).unwrap();
        assert_eq!(moved.value(ParamName::Y0), Some(5.0));
        assert_eq!(moved.value(ParamName::Ex), Some(0.0));
        assert!((moved.value(ParamName::Scale).unwrap() - 2.0).abs() < 1e-12);
        assert!(ps.with_free_internal(&[1.0]).is_err());
    }

    #[test]
    fn coefficients_require_order_specific_params() {
        let mut ps = ModelParameters::new();
        for (n, v) in [
            (ParamName::Y0, 0.0),
            (ParamName::Gain, 1.0),
            (ParamName::Lag, 0.1),
            (ParamName::Scale, 1.0),
        ] {
            ps.add(Parameter::free(n, v));
        }
        assert!(Coefficients::from_params(&ps, 1).is_ok());
        assert_eq!(
            Coefficients::from_params(&ps, 2),
            Err(ModelError::MissingParameter {
                name: ParamName::Damping
            })
        );
    }
}
