//! On-disk signal data: named traces per shot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalTrace {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_units: Option<String>,
}

/// Traces keyed by pointname, then by shot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SignalFile {
    #[serde(default)]
    pub signals: BTreeMap<String, BTreeMap<i64, SignalTrace>>,
}

impl SignalFile {
    pub fn insert(&mut self, pointname: impl Into<String>, shot: i64, trace: SignalTrace) {
        self.signals
            .entry(pointname.into())
            .or_default()
            .insert(shot, trace);
    }

    pub fn get(&self, pointname: &str, shot: i64) -> Option<&SignalTrace> {
        self.signals.get(pointname)?.get(&shot)
    }
}
