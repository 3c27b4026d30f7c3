//! Case schema definitions.

use ca_fit::{DEFAULT_FIT_NPTS, FitMethod, FitNanPolicy};
use ca_signal::smooth::DEFAULT_MEDIAN_FILTER_MAX_STEPS;
use ca_signal::{Smoother, WindowFunction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    SystemIdentification,
    ControlQuality,
}

impl AnalysisKind {
    /// Signals the analysis knows how to use.
    pub fn quantities(self) -> &'static [&'static str] {
        match self {
            AnalysisKind::SystemIdentification => {
                &["response", "command", "target", "enable", "response_uncertainty"]
            }
            AnalysisKind::ControlQuality => {
                &["measurement", "target", "enable", "command", "measurement_uncertainty"]
            }
        }
    }

    /// Key under which fit results are stored; `{order}` is substituted.
    pub fn fit_out_name_format(self) -> &'static str {
        match self {
            AnalysisKind::SystemIdentification => "order_{order}_system_identification_fit",
            AnalysisKind::ControlQuality => "order_{order}_response_to_target",
        }
    }

    /// Tag used when persisting results.
    pub fn rdb_tag(self) -> &'static str {
        match self {
            AnalysisKind::SystemIdentification => "sys",
            AnalysisKind::ControlQuality => "cq",
        }
    }
}

/// One shot or several.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ShotSelection {
    One(i64),
    Many(Vec<i64>),
}

impl Default for ShotSelection {
    fn default() -> Self {
        ShotSelection::Many(Vec::new())
    }
}

impl ShotSelection {
    pub fn to_vec(&self) -> Vec<i64> {
        match self {
            ShotSelection::One(s) => vec![*s],
            ShotSelection::Many(v) => v.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ShotSelection::Many(v) if v.is_empty())
    }
}

/// Where to fetch one signal, and how to rescale it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalSpec {
    #[serde(default)]
    pub pointname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treename: Option<String>,
    /// Multiplies x together with `overall_x_factor`
    #[serde(default = "one")]
    pub x_factor: f64,
    #[serde(default = "one")]
    pub y_factor: f64,
    /// Overrides the units reported by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl SignalSpec {
    pub fn pointname(pointname: impl Into<String>) -> Self {
        Self {
            pointname: pointname.into(),
            treename: None,
            x_factor: 1.0,
            y_factor: 1.0,
            units: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RdbSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// `sys` or `cq`; defaults from the analysis kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Everything needed to set up one analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub kind: AnalysisKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default)]
    pub shot: ShotSelection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Analysis window, in x units after rescaling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_units: Option<String>,

    #[serde(default)]
    pub smoother: Smoother,
    /// Smoothing scale in x units; estimated from the data when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default)]
    pub window_function: WindowFunction,
    #[serde(default)]
    pub causal_smoothing: bool,
    /// Smooth the response (measurement) before any other processing
    #[serde(default)]
    pub smooth_response: bool,
    #[serde(default = "default_median_filter_max_steps")]
    pub median_filter_max_steps: usize,

    #[serde(default = "default_fit_npts")]
    pub fit_npts: usize,
    #[serde(default)]
    pub fit_method: FitMethod,
    #[serde(default)]
    pub nan_policy: FitNanPolicy,
    #[serde(default)]
    pub variable_gain: bool,
    #[serde(default)]
    pub modified_y: bool,
    /// Detected from the data when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform_dx: Option<bool>,
    #[serde(default = "default_order")]
    pub default_order: i64,

    /// 1e-3 for DIII-D (ms to s), else 1, when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_x_factor: Option<f64>,
    #[serde(default = "one")]
    pub overall_y_factor: f64,
    /// Keyed by quantity name (`response`, `command`, `measurement`, ...)
    #[serde(default)]
    pub signals: BTreeMap<String, SignalSpec>,
    /// Units of measurement and target (control quality)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Data count only where `enable` equals this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_value: Option<f64>,
    #[serde(default)]
    pub xwin: Vec<(f64, f64)>,
    #[serde(default = "yes")]
    pub allowed_to_make_effective_target: bool,
    #[serde(default = "default_min_frac_err")]
    pub min_frac_err: f64,
    #[serde(default = "default_max_frac_err")]
    pub max_frac_err: f64,
    /// Don't announce problems of instances built without data
    #[serde(default = "yes")]
    pub quiet_dummy: bool,
    #[serde(default)]
    pub rdb: RdbSettings,
}

impl CaseConfig {
    pub fn new(kind: AnalysisKind) -> Self {
        Self {
            version: default_version(),
            kind,
            device: None,
            shot: ShotSelection::default(),
            topic: None,
            time_range: None,
            time_units: None,
            smoother: Smoother::default(),
            scale: None,
            window_function: WindowFunction::default(),
            causal_smoothing: false,
            smooth_response: false,
            median_filter_max_steps: DEFAULT_MEDIAN_FILTER_MAX_STEPS,
            fit_npts: DEFAULT_FIT_NPTS,
            fit_method: FitMethod::default(),
            nan_policy: FitNanPolicy::default(),
            variable_gain: false,
            modified_y: false,
            uniform_dx: None,
            default_order: default_order(),
            overall_x_factor: None,
            overall_y_factor: 1.0,
            signals: BTreeMap::new(),
            units: None,
            enable_value: None,
            xwin: Vec::new(),
            allowed_to_make_effective_target: true,
            min_frac_err: default_min_frac_err(),
            max_frac_err: default_max_frac_err(),
            quiet_dummy: true,
            rdb: RdbSettings::default(),
        }
    }

    /// The configured x factor, or the device default.
    pub fn effective_overall_x_factor(&self) -> f64 {
        self.overall_x_factor.unwrap_or_else(|| {
            if self.device.as_deref().is_some_and(is_diii_d) {
                1e-3
            } else {
                1.0
            }
        })
    }

    pub fn signal(&self, quantity: &str) -> Option<&SignalSpec> {
        self.signals.get(quantity)
    }

    pub fn with_signal(mut self, quantity: impl Into<String>, spec: SignalSpec) -> Self {
        self.signals.insert(quantity.into(), spec);
        self
    }

    pub fn rdb_tag(&self) -> String {
        self.rdb
            .tag
            .clone()
            .unwrap_or_else(|| self.kind.rdb_tag().to_string())
    }
}

fn is_diii_d(device: &str) -> bool {
    let d: String = device
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase();
    d == "DIIID" || d == "D3D"
}

fn default_version() -> u32 {
    crate::LATEST_VERSION
}

fn default_fit_npts() -> usize {
    DEFAULT_FIT_NPTS
}

fn default_median_filter_max_steps() -> usize {
    DEFAULT_MEDIAN_FILTER_MAX_STEPS
}

fn default_order() -> i64 {
    2
}

fn default_min_frac_err() -> f64 {
    0.05
}

fn default_max_frac_err() -> f64 {
    0.35
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_takes_every_default() {
        let case: CaseConfig = serde_yaml::from_str("kind: control_quality\n").unwrap();
        assert_eq!(case, CaseConfig::new(AnalysisKind::ControlQuality));
        assert_eq!(case.fit_npts, 250);
        assert_eq!(case.fit_method, FitMethod::NelderMead);
        assert_eq!(case.nan_policy, FitNanPolicy::Raise);
        assert_eq!(case.smoother, Smoother::Butterworth);
        assert_eq!(case.median_filter_max_steps, 3503);
        assert!(case.allowed_to_make_effective_target);
    }

    #[test]
    fn x_factor_follows_the_device() {
        let mut case = CaseConfig::new(AnalysisKind::SystemIdentification);
        assert_eq!(case.effective_overall_x_factor(), 1.0);
        case.device = Some("DIII-D".into());
        assert_eq!(case.effective_overall_x_factor(), 1e-3);
        case.overall_x_factor = Some(2.0);
        assert_eq!(case.effective_overall_x_factor(), 2.0);
    }

    #[test]
    fn shots_accept_one_or_many() {
        let one: ShotSelection = serde_yaml::from_str("180000").unwrap();
        let many: ShotSelection = serde_yaml::from_str("[1, 2]").unwrap();
        assert_eq!(one.to_vec(), vec![180000]);
        assert_eq!(many.to_vec(), vec![1, 2]);
    }

    #[test]
    fn signal_specs_default_their_factors() {
        let yaml = "kind: system_identification\nfit_method: nelder\nsignals:\n  response:\n    pointname: prad\n";
        let case: CaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(case.signal("response"), Some(&SignalSpec::pointname("prad")));
        assert_eq!(case.rdb_tag(), "sys");
    }
}
