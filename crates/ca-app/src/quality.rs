//! Control quality: how well a measurement followed its target.

use crate::common::AnalysisCore;
use crate::error::{AppError, AppResult};
use crate::history::InputData;
use crate::ledger::Complaint;
use crate::report::{ReportValue, format_report_line};
use crate::source::SignalSource;
use ca_case::CaseConfig;
use ca_fit::{FitResult, FitUnits};
use ca_metrics::{ControlSeries, MetricSettings, MetricsBundle, calculate_control_metrics};
use ca_signal::stats::{take, valid_indices};
use ca_core::Shots;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

pub const CQ_NOTE: &str = "    The target is being treated as the command.\n    So, the controller is part of the system & gain should be exactly 1.";

pub const INIT_EXCEPTION: &str = "Exception during init/basic calculations & setup";

pub const TARGET_DOES_NOT_VARY: &str = "Target does not vary; fitting does not make sense.";

#[derive(Clone, Debug)]
pub struct ControlQuality {
    pub core: AnalysisCore,
    /// Units of measurement and target
    pub units: String,
    /// Per-shot data the metrics were computed from
    pub series: Vec<ControlSeries>,
    /// One bundle per shot; absent for a degraded instance
    pub metrics: Option<Vec<MetricsBundle>>,
    /// Message of the error that stopped setup, if any
    pub init_error: Option<String>,
}

impl ControlQuality {
    pub const CLASS_NAME: &'static str = "ControlQuality";

    /// Set up from supplied data, fetching whatever is missing, and compute
    /// the metrics.
    ///
    /// Errors during setup and calculation do not fail construction: they
    /// are recorded at severity 8 and kept in `init_error`.
    pub fn new(
        config: CaseConfig,
        data: InputData,
        mut source: Option<&mut (dyn SignalSource + '_)>,
    ) -> Self {
        let mut core = AnalysisCore::new(config, Self::CLASS_NAME);
        core.load_input(data);
        core.fetch_all(
            source.as_deref_mut(),
            &["measurement", "target", "enable", "command", "measurement_uncertainty"],
        );

        let units = core
            .config
            .units
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| most_common_units(&core, &["target", "measurement"]))
            .unwrap_or_default();
        for q in ["measurement", "target", "measurement_uncertainty"] {
            core.units.entry(q.to_string()).or_insert_with(|| units.clone());
        }

        if let (Some(enable), Some(value)) = (core.history.get("enable").cloned(), core.config.enable_value)
            && let Some(target) = core.history.get("target").cloned()
            && let Ok(gated) = target.zip_with(&enable, |t, e| if e == value { t } else { f64::NAN })
        {
            core.history.insert("raw_target", target);
            core.history.insert("target", gated);
        }

        let mut cq = Self {
            core,
            units,
            series: Vec::new(),
            metrics: None,
            init_error: None,
        };

        let has_basic = cq.core.history.has_x()
            && cq.core.history.contains("measurement")
            && cq.core.history.contains("target");
        if has_basic {
            if let Err(e) = cq.setup_and_calculate(source) {
                error!(case = %cq.core.case, error = %e, "failed to complete init");
                cq.core.ledger.record(INIT_EXCEPTION, 8);
                cq.init_error = Some(e.to_string());
            }
        } else {
            if !cq.core.config.quiet_dummy {
                warn!("ControlQuality doesn't have enough data to initialize properly; starting a dummy instance");
            }
            cq.core.mark_missing_basic_data();
        }

        let quiet = cq.core.config.quiet_dummy;
        cq.core.complain(quiet, true);
        info!(case = %cq.core.case, status = %cq.core.status_line(), "control quality ready");
        cq
    }

    fn setup_and_calculate(&mut self, source: Option<&mut (dyn SignalSource + '_)>) -> AppResult<()> {
        self.core.setup_calcs();
        self.core.setup_smooth("measurement")?;
        if !self.core.history.contains("measurement_uncertainty") {
            let (lo, hi) = (self.core.config.min_frac_err, self.core.config.max_frac_err);
            self.core.estimate_uncertainty("measurement", lo, hi)?;
        }
        if self.core.config.smooth_response {
            self.core.smooth_quantity("measurement", source)?;
        }
        self.calculate()
    }

    pub fn is_valid(&self) -> bool {
        self.metrics.is_some()
    }

    /// Compute every metric, one bundle per shot.
    ///
    /// Each shot uses the rows where x is defined, so NaN padding from
    /// shorter shots is dropped.
    pub fn calculate(&mut self) -> AppResult<()> {
        let h = &self.core.history;
        let (Some(x), Some(m), Some(t)) = (h.x.as_ref(), h.get("measurement"), h.get("target")) else {
            return Err(AppError::MissingData {
                what: "control quality needs x, measurement and target".to_string(),
            });
        };
        let unc = h.get("measurement_uncertainty");
        let err = m.zip_with(t, |m, t| m - t)?;

        let settings = MetricSettings {
            smoothing: self.core.smoothing()?.clone(),
            allowed_to_make_effective_target: self.core.config.allowed_to_make_effective_target,
            xwin: self.core.config.xwin.clone(),
            units: self.units.clone(),
            x_units: self.core.time_units.clone(),
        };
        let mut series = Vec::with_capacity(m.n_shots());
        let mut bundles = Vec::with_capacity(m.n_shots());
        for i in 0..m.n_shots() {
            let xs = x.shot_or_first(i);
            let rows = valid_indices(&[xs]);
            let mut s = ControlSeries::new(take(xs, &rows), take(m.shot(i), &rows), take(t.shot(i), &rows));
            if let Some(u) = unc {
                s = s.with_uncertainty(take(u.shot(i), &rows));
            }
            bundles.push(calculate_control_metrics(&mut s, &settings)?);
            series.push(s);
        }
        self.core.history.insert("err", err);
        self.series = series;
        self.metrics = Some(bundles);
        Ok(())
    }

    /// Whether the target moves in any shot. True before metrics exist.
    pub fn target_varies(&self) -> bool {
        self.metrics
            .as_ref()
            .is_none_or(|b| b.iter().any(|b| b.summary.target_varies))
    }

    /// Fit the measurement's response to the target.
    ///
    /// With a flat target the fit is refused unless `force` is set. The fit
    /// replaces any earlier one of the same order unless `new_name` is set.
    pub fn fit(
        &mut self,
        order: i64,
        guess: Vec<Option<f64>>,
        force: bool,
        new_name: bool,
    ) -> AppResult<&FitResult> {
        if !self.target_varies() && !force {
            self.core.ledger.record(TARGET_DOES_NOT_VARY, 6);
            return Err(AppError::Refused {
                reason: "the target does not appear to vary, so fitting the response to it is a bad idea"
                    .to_string(),
            });
        }
        if self.series.is_empty() {
            return Err(AppError::MissingData {
                what: "control quality has no data to fit".to_string(),
            });
        }
        let mut cols: [Vec<Vec<f64>>; 4] = Default::default();
        let with_err = self.series.iter().all(|s| s.uncertainty.is_some());
        for s in &self.series {
            let nan = vec![f64::NAN; s.len()];
            let e = s.uncertainty.as_deref().unwrap_or(&nan);
            let mut inputs = vec![s.x.as_slice(), s.measurement.as_slice(), s.target.as_slice()];
            if with_err {
                inputs.push(e);
            }
            let rows = valid_indices(&inputs);
            for (col, v) in cols.iter_mut().zip([&s.x, &s.measurement, &s.target]) {
                col.push(take(v, &rows));
            }
            cols[3].push(take(e, &rows));
        }
        let [x, y, u, e] = cols.map(Shots::from_columns);
        let (x, y, u) = (x?, y?, u?);
        let y_err = if with_err { Some(e?) } else { None };

        let units = FitUnits {
            x: self.core.time_units.clone(),
            y: self.units.clone(),
            u: self.units.clone(),
        };
        let name = self
            .core
            .fit_model(&x, &y, &u, y_err.as_ref(), order, guess, false, units, new_name)?
            .name
            .clone();
        let fit = &self.core.fits[&name];
        if let Some(bundles) = self.metrics.as_mut() {
            for b in bundles.iter_mut() {
                b.record_gain_error(fit);
            }
        }
        Ok(fit)
    }

    fn metric_lines(&self, bundle: &MetricsBundle) -> Vec<String> {
        let s = &bundle.summary;
        let mut lines = vec!["summary".to_string()];
        let summary: [(&str, ReportValue, &str); 5] = [
            ("norm", s.norm.into(), &s.norm_units),
            ("xnorm", s.xnorm.into(), &s.xnorm_units),
            ("target_varies", s.target_varies.into(), ""),
            ("effective_target", s.effective_target.into(), ""),
            ("uniform_dx", self.core.uniform_dx.unwrap_or(false).into(), ""),
        ];
        for (label, value, units) in &summary {
            lines.push(format_report_line(label, value, units, None));
        }
        for (branch, set) in [("raw", &bundle.raw), ("normalized", &bundle.normalized)] {
            lines.push(branch.to_string());
            for (label, value, units) in set.rows() {
                lines.push(format_report_line(&label, &value.into(), &units, None));
            }
        }
        lines
    }

    pub fn report(&self, orders: &[i64]) -> String {
        let mut lines = self.core.case_header();
        if let Some(bundles) = &self.metrics {
            let shots = self.core.config.shot.to_vec();
            for (i, bundle) in bundles.iter().enumerate() {
                if bundles.len() > 1 {
                    let shot = shots.get(i).map_or_else(|| i.to_string(), i64::to_string);
                    lines.push(format!("shot {shot}"));
                }
                lines.extend(self.metric_lines(bundle));
            }
        }
        lines.push(self.core.fit_report(orders, CQ_NOTE));
        lines.join("\n")
    }

    pub fn complain(&self, quiet: bool, no_good_news: bool) -> Complaint {
        self.core.complain(quiet, no_good_news)
    }

    /// Effective settings, including the units settled on.
    pub fn settings(&self) -> CaseConfig {
        let mut cfg = self.core.settings();
        if !self.units.is_empty() {
            cfg.units = Some(self.units.clone());
        }
        cfg
    }
}

/// Most frequent non-empty units among `quantities`; ties go to the first seen.
fn most_common_units(core: &AnalysisCore, quantities: &[&str]) -> Option<String> {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for (i, q) in quantities.iter().enumerate() {
        let u = core.units_of(q);
        if !u.is_empty() {
            counts.entry(u).or_insert((0, i)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        .map(|(u, _)| u)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_case::AnalysisKind;

    fn config() -> CaseConfig {
        let mut c = CaseConfig::new(AnalysisKind::ControlQuality);
        c.scale = Some(0.2);
        c.units = Some("kA".into());
        c.time_units = Some("s".into());
        c
    }

    fn step_data(n: usize) -> InputData {
        let x: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        let target: Vec<f64> = x.iter().map(|t| if *t < 1.0 { 1.0 } else { 2.0 }).collect();
        let measurement: Vec<f64> = x
            .iter()
            .map(|t| if *t < 1.0 { 1.0 } else { 2.0 - (-(t - 1.0) / 0.1).exp() })
            .collect();
        InputData::new(Shots::single(x))
            .with("measurement", Shots::single(measurement))
            .with("target", Shots::single(target))
    }

    #[test]
    fn step_target_is_evaluated() {
        let cq = ControlQuality::new(config(), step_data(300), None);
        assert!(cq.init_error.is_none(), "{:?}", cq.init_error);
        let m = &cq.metrics.as_ref().unwrap()[0];
        assert!(m.summary.target_varies);
        assert!(m.raw.rms_error > 0.0);
        assert!(cq.core.history.contains("measurement_uncertainty"));
        let report = cq.report(&[1, 2]);
        assert!(report.contains("summary"));
        assert!(report.contains("RMS_error"));
    }

    #[test]
    fn flat_target_refuses_to_fit() {
        let x: Vec<f64> = (0..200).map(|i| i as f64 * 0.01).collect();
        let data = InputData::new(Shots::single(x.clone()))
            .with("measurement", Shots::single(x.iter().map(|t| 1.0 + 0.01 * t).collect()))
            .with("target", Shots::single(vec![1.0; 200]));
        let mut c = config();
        c.allowed_to_make_effective_target = false;
        let mut cq = ControlQuality::new(c, data, None);
        assert!(!cq.target_varies());
        let err = cq.fit(2, Vec::new(), false, false).unwrap_err();
        assert!(matches!(err, AppError::Refused { .. }));
        assert_eq!(cq.core.ledger.get(TARGET_DOES_NOT_VARY), Some(6));
    }

    #[test]
    fn units_default_to_the_most_common() {
        let mut c = config();
        c.units = None;
        let data = step_data(100).with_units("target", "eV").with_units("measurement", "eV");
        let cq = ControlQuality::new(c, data, None);
        assert_eq!(cq.units, "eV");
        assert_eq!(cq.settings().units.as_deref(), Some("eV"));
    }
}
