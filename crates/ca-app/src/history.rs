//! Time histories held by an analysis.

use ca_core::Shots;
use std::collections::BTreeMap;

/// x and named quantities, all N samples x S shots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    pub x: Option<Shots>,
    series: BTreeMap<String, Shots>,
}

impl History {
    pub fn get(&self, quantity: &str) -> Option<&Shots> {
        self.series.get(quantity)
    }

    pub fn get_mut(&mut self, quantity: &str) -> Option<&mut Shots> {
        self.series.get_mut(quantity)
    }

    pub fn contains(&self, quantity: &str) -> bool {
        self.series.contains_key(quantity)
    }

    pub fn insert(&mut self, quantity: impl Into<String>, values: Shots) -> Option<Shots> {
        self.series.insert(quantity.into(), values)
    }

    pub fn remove(&mut self, quantity: &str) -> Option<Shots> {
        self.series.remove(quantity)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn has_x(&self) -> bool {
        self.x.as_ref().is_some_and(|x| !x.is_empty())
    }
}

/// Data handed straight to a constructor instead of being fetched.
///
/// Quantities are only used when `x` is present.
#[derive(Clone, Debug, Default)]
pub struct InputData {
    pub x: Option<Shots>,
    pub quantities: BTreeMap<String, Shots>,
    pub units: BTreeMap<String, String>,
}

impl InputData {
    pub fn new(x: Shots) -> Self {
        Self {
            x: Some(x),
            ..Default::default()
        }
    }

    /// Nothing supplied; everything is fetched.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, quantity: impl Into<String>, values: Shots) -> Self {
        self.quantities.insert(quantity.into(), values);
        self
    }

    pub fn with_units(mut self, quantity: impl Into<String>, units: impl Into<String>) -> Self {
        self.units.insert(quantity.into(), units.into());
        self
    }
}
