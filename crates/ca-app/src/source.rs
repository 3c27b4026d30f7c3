//! Where raw signals come from.

use ca_case::SignalFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("No data for {pointname} in shot {shot}")]
    NotFound { pointname: String, shot: i64 },

    #[error("Malformed data for {pointname} in shot {shot}: {what}")]
    Malformed {
        pointname: String,
        shot: i64,
        what: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub device: String,
    pub shot: i64,
    pub pointname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treename: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchedSignal {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(default)]
    pub y_units: String,
    #[serde(default)]
    pub x_units: String,
}

impl FetchedSignal {
    fn check(self, req: &FetchRequest) -> Result<Self, SourceError> {
        if self.x.len() != self.y.len() {
            return Err(SourceError::Malformed {
                pointname: req.pointname.clone(),
                shot: req.shot,
                what: format!("{} x samples but {} y samples", self.x.len(), self.y.len()),
            });
        }
        Ok(self)
    }
}

pub trait SignalSource {
    fn fetch(&mut self, req: &FetchRequest) -> Result<FetchedSignal, SourceError>;
}

/// Signals keyed by `(pointname, shot)`; the device is ignored.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    signals: BTreeMap<(String, i64), FetchedSignal>,
    fetches: usize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pointname: impl Into<String>, shot: i64, signal: FetchedSignal) {
        self.signals.insert((pointname.into(), shot), signal);
    }

    pub fn with(mut self, pointname: impl Into<String>, shot: i64, signal: FetchedSignal) -> Self {
        self.insert(pointname, shot, signal);
        self
    }

    /// Number of fetch calls served so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

impl SignalSource for InMemorySource {
    fn fetch(&mut self, req: &FetchRequest) -> Result<FetchedSignal, SourceError> {
        self.fetches += 1;
        self.signals
            .get(&(req.pointname.clone(), req.shot))
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                pointname: req.pointname.clone(),
                shot: req.shot,
            })?
            .check(req)
    }
}

impl SignalSource for SignalFile {
    fn fetch(&mut self, req: &FetchRequest) -> Result<FetchedSignal, SourceError> {
        let trace = self
            .get(&req.pointname, req.shot)
            .ok_or_else(|| SourceError::NotFound {
                pointname: req.pointname.clone(),
                shot: req.shot,
            })?;
        FetchedSignal {
            x: trace.x.clone(),
            y: trace.y.clone(),
            y_units: trace.units.clone().unwrap_or_default(),
            x_units: trace.x_units.clone().unwrap_or_default(),
        }
        .check(req)
    }
}
