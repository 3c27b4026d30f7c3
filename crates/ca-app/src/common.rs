//! State and setup steps shared by both analyses.

use crate::error::{AppError, AppResult};
use crate::history::{History, InputData};
use crate::ledger::{Complaint, ProblemLedger};
use crate::report::{ReportValue, format_report_line, pretty_name};
use crate::source::{FetchRequest, SignalSource};
use ca_case::CaseConfig;
use ca_core::{Shots, describe_case, diff, nanmean, nanstd, pick_name};
use ca_fit::{FitRequest, FitResult, FitUnits, fit_response_model};
use ca_models::{ModelOrder, ParamName};
use ca_signal::stats::{take, valid_indices};
use ca_signal::{Extrapolate, SmoothSettings, auto_scale, interp1d, noise_estimator, smooth};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Relative spread of dx below which x counts as evenly spaced.
pub const UNIFORM_DX_TOLERANCE: f64 = 1e-3;

/// High-pass cutoff of the noise estimate, as a fraction of the smoothing scale.
pub const NOISE_CUTOFF_FRACTION: f64 = 0.1;

pub const NOISE_DT_VAR_THRESH: f64 = 1e-3;

pub const MISSING_BASIC_DATA: &str = "Missing basic data";

#[derive(Clone, Debug)]
pub struct AnalysisCore {
    pub config: CaseConfig,
    pub ledger: ProblemLedger,
    pub history: History,
    /// Units keyed by quantity; missing means unitless
    pub units: BTreeMap<String, String>,
    pub time_units: String,
    pub smoothing: Option<SmoothSettings>,
    pub uniform_dx: Option<bool>,
    /// Fit results keyed by name
    pub fits: BTreeMap<String, FitResult>,
    /// `topic: DEVICE#shot`
    pub case: String,
    class_name: &'static str,
}

impl AnalysisCore {
    pub fn new(config: CaseConfig, class_name: &'static str) -> Self {
        let case = describe_case(
            config.topic.as_deref(),
            config.device.as_deref(),
            &config.shot.to_vec(),
        );
        let units = config
            .signals
            .iter()
            .filter_map(|(q, s)| s.units.clone().map(|u| (q.clone(), u)))
            .collect();
        let time_units = config.time_units.clone().unwrap_or_default();
        Self {
            config,
            ledger: ProblemLedger::new(),
            history: History::default(),
            units,
            time_units,
            smoothing: None,
            uniform_dx: None,
            fits: BTreeMap::new(),
            case,
            class_name,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Take directly supplied arrays. Quantities only count when x is given.
    pub fn load_input(&mut self, data: InputData) {
        let Some(x) = data.x else {
            return;
        };
        self.history.x = Some(x);
        for (q, v) in data.quantities {
            self.history.insert(q, v);
        }
        for (q, u) in data.units {
            self.units.entry(q).or_insert(u);
        }
    }

    pub fn units_of(&self, quantity: &str) -> String {
        self.units.get(quantity).cloned().unwrap_or_default()
    }

    /// Fetch every quantity in order, stopping at the first hard failure.
    pub fn fetch_all(
        &mut self,
        source: Option<&mut (dyn SignalSource + '_)>,
        quantities: &[&str],
    ) {
        let Some(source) = source else {
            return;
        };
        for q in quantities {
            if let Err(e) = self.fetch_data(&mut *source, q, false) {
                warn!(quantity = q, error = %e, "data gathering aborted");
                return;
            }
        }
    }

    /// Fetch one quantity for every shot.
    ///
    /// Skipped when the quantity is already present, or when there is no
    /// device or pointname. The first quantity fetched defines x, cropped to
    /// the time range; later ones are interpolated onto it. A failed fetch is
    /// recorded in the ledger and leaves the quantity absent.
    pub fn fetch_data(
        &mut self,
        source: &mut (dyn SignalSource + '_),
        quantity: &str,
        smooth_first: bool,
    ) -> AppResult<()> {
        if self.history.x.is_some() && self.history.contains(quantity) {
            debug!(quantity, "already have data");
            return Ok(());
        }
        let Some(device) = self.config.device.clone() else {
            return Ok(());
        };
        let Some(spec) = self
            .config
            .signal(quantity)
            .filter(|s| !s.pointname.is_empty())
            .cloned()
        else {
            debug!(quantity, "no pointname");
            return Ok(());
        };
        let shots = self.config.shot.to_vec();
        if shots.is_empty() {
            return Ok(());
        }
        let x_factor = spec.x_factor * self.config.effective_overall_x_factor();
        let y_factor = spec.y_factor * self.config.overall_y_factor;

        let (mut xs, mut ys) = (Vec::new(), Vec::new());
        for (i, &shot) in shots.iter().enumerate() {
            let req = FetchRequest {
                device: device.clone(),
                shot,
                pointname: spec.pointname.clone(),
                treename: spec.treename.clone(),
            };
            let sig = match source.fetch(&req) {
                Ok(sig) => sig,
                Err(e) => {
                    warn!(quantity, shot, error = %e, "aborted data fetching");
                    self.ledger.record(
                        format!(
                            "Failed to gather data for {quantity} with pointname {}",
                            spec.pointname
                        ),
                        8,
                    );
                    return Ok(());
                }
            };
            let mut x1: Vec<f64> = sig.x.iter().map(|v| v * x_factor).collect();
            let mut y1: Vec<f64> = sig.y.iter().map(|v| v * y_factor).collect();
            self.units
                .entry(quantity.to_string())
                .or_insert_with(|| sig.y_units.clone());

            if smooth_first
                && let Some(settings) = self.smoothing.clone()
            {
                if let Some((t0, t1)) = self.config.time_range {
                    let pad = 2.0 * settings.scale;
                    let sel: Vec<usize> = (0..x1.len())
                        .filter(|&k| x1[k] >= t0 - pad && x1[k] <= t1 + pad)
                        .collect();
                    x1 = take(&x1, &sel);
                    y1 = take(&y1, &sel);
                }
                debug!(quantity, ?settings.method, settings.scale, "smoothing while fetching");
                y1 = smooth(&x1, &y1, &settings)?;
            }

            match &self.history.x {
                None => {
                    if let Some((t0, t1)) = self.config.time_range {
                        let sel: Vec<usize> =
                            (0..x1.len()).filter(|&k| x1[k] >= t0 && x1[k] <= t1).collect();
                        if sel.is_empty() {
                            self.ledger.record("No x data found within time range", 8);
                            return Err(AppError::MissingData {
                                what: format!(
                                    "no x data for {quantity} within time range [{t0}, {t1}]"
                                ),
                            });
                        }
                        x1 = take(&x1, &sel);
                        y1 = take(&y1, &sel);
                    }
                    if self.time_units.is_empty() {
                        self.time_units = if x_factor == 1e-3 && sig.x_units == "ms" {
                            "s".to_string()
                        } else if x_factor != 1.0 {
                            format!("{x_factor} {}", sig.x_units)
                        } else {
                            sig.x_units.clone()
                        };
                    }
                }
                Some(cx) => {
                    let cxi: Vec<f64> = cx
                        .shot_or_first(i)
                        .iter()
                        .copied()
                        .filter(|v| !v.is_nan())
                        .collect();
                    y1 = interp1d(&x1, &y1, &cxi, Extrapolate::Fill(f64::NAN));
                    x1 = cxi;
                }
            }
            debug!(quantity, shot, len = y1.len(), "fetched");
            xs.push(x1);
            ys.push(y1);
        }

        if self.history.x.is_none() {
            self.history.x = Some(Shots::from_columns(xs)?);
        }
        self.history.insert(quantity, Shots::from_columns(ys)?);
        Ok(())
    }

    /// Decide whether x is evenly spaced, unless the case says so.
    pub fn setup_calcs(&mut self) {
        let detected = self.history.x.as_ref().is_some_and(|x| {
            let stats: Vec<(f64, f64)> = x
                .shots()
                .map(|xs| {
                    let dx = diff(xs);
                    (nanmean(&dx), nanstd(&dx))
                })
                .collect();
            stats.iter().all(|(m, _)| *m == 0.0)
                || stats.iter().all(|(m, s)| s / m < UNIFORM_DX_TOLERANCE)
        });
        self.uniform_dx = Some(self.config.uniform_dx.unwrap_or(detected));
    }

    /// Smoothing settings, estimating the scale from `reference` when the
    /// case does not give one.
    pub fn setup_smooth(&mut self, reference: &str) -> AppResult<()> {
        let scale = match self.config.scale {
            Some(s) => s,
            None => {
                let (Some(x), Some(y)) = (self.history.x.as_ref(), self.history.get(reference))
                else {
                    return Err(AppError::MissingData {
                        what: format!("{reference} is needed to pick a smoothing scale"),
                    });
                };
                let scales: Vec<f64> = (0..y.n_shots())
                    .map(|i| {
                        let xs = x.shot_or_first(i);
                        let idx = valid_indices(&[xs, y.shot(i)]);
                        auto_scale(&take(xs, &idx), &take(y.shot(i), &idx))
                    })
                    .collect();
                nanmean(&scales)
            }
        };
        if !(scale.is_finite() && scale > 0.0) {
            return Err(AppError::InvalidInput(format!(
                "smoothing scale {scale} is not usable; set scale in the case"
            )));
        }
        let mut settings = SmoothSettings::new(self.config.smoother, scale)
            .causal(self.config.causal_smoothing)
            .window(self.config.window_function);
        settings.median_filter_max_steps = self.config.median_filter_max_steps;
        info!(method = ?settings.method, scale, "smoothing set up");
        self.smoothing = Some(settings);
        Ok(())
    }

    pub fn smoothing(&self) -> AppResult<&SmoothSettings> {
        self.smoothing.as_ref().ok_or_else(|| AppError::MissingData {
            what: "smoothing has not been set up".to_string(),
        })
    }

    pub fn scale(&self) -> f64 {
        self.smoothing.as_ref().map_or(f64::NAN, |s| s.scale)
    }

    /// Apply `f` to the valid rows of each shot of `y`; other rows are NaN.
    fn per_shot<F>(&self, y: &Shots, min_len: usize, mut f: F) -> AppResult<Shots>
    where
        F: FnMut(&[f64], &[f64]) -> AppResult<Vec<f64>>,
    {
        let x = self.history.x.as_ref().ok_or_else(|| AppError::MissingData {
            what: "x".to_string(),
        })?;
        let mut out = y.map_values(|_| f64::NAN);
        for i in 0..y.n_shots() {
            let xs = x.shot_or_first(i);
            let idx = valid_indices(&[xs, y.shot(i)]);
            if idx.len() < min_len {
                continue;
            }
            let v = f(&take(xs, &idx), &take(y.shot(i), &idx))?;
            let col = out.shot_mut(i);
            for (k, val) in idx.into_iter().zip(v) {
                col[k] = val;
            }
        }
        Ok(out)
    }

    /// Smooth every shot with the analysis settings.
    pub fn smooth_shots(&self, y: &Shots) -> AppResult<Shots> {
        let settings = self.smoothing()?.clone();
        self.per_shot(y, 2, |x, y| Ok(smooth(x, y, &settings)?))
    }

    /// Smooth `quantity` in place, keeping the original as `raw_{quantity}`.
    ///
    /// The median filter is run on refetched data before cropping so its
    /// edges fall outside the time range.
    pub fn smooth_quantity(
        &mut self,
        quantity: &str,
        source: Option<&mut (dyn SignalSource + '_)>,
    ) -> AppResult<()> {
        let Some(raw) = self.history.get(quantity).cloned() else {
            return Ok(());
        };
        self.history.insert(format!("raw_{quantity}"), raw.clone());
        let refetch = self.config.smoother == ca_signal::Smoother::MedianFilter
            && self
                .config
                .signal(quantity)
                .is_some_and(|s| !s.pointname.is_empty());
        if refetch && let Some(source) = source {
            self.history.remove(quantity);
            self.fetch_data(source, quantity, true)?;
            if self.history.contains(quantity) {
                return Ok(());
            }
        }
        let smoothed = self.smooth_shots(&raw)?;
        self.history.insert(quantity, smoothed);
        Ok(())
    }

    /// Estimate the uncertainty in `reference` from its high-frequency
    /// content, clamped to `[min_frac_err, max_frac_err] * |y|`.
    ///
    /// Cached as `{reference}_uncertainty`; an existing entry is returned as is.
    pub fn estimate_uncertainty(
        &mut self,
        reference: &str,
        min_frac_err: f64,
        max_frac_err: f64,
    ) -> AppResult<Option<Shots>> {
        let tag = format!("{reference}_uncertainty");
        if let Some(existing) = self.history.get(&tag) {
            return Ok(Some(existing.clone()));
        }
        let units = self.units_of(reference);
        self.units.insert(tag.clone(), units);
        let (Some(y), true) = (self.history.get(reference).cloned(), self.history.has_x()) else {
            warn!(reference, "cannot estimate uncertainty without data");
            self.ledger
                .record(format!("Failed to estimate uncertainty in {reference}"), 6);
            return Ok(None);
        };
        let cutoff = self.scale() * NOISE_CUTOFF_FRACTION;
        let mut y_err = self.per_shot(&y, 3, |x, y| {
            Ok(noise_estimator(x, y, cutoff, NOISE_DT_VAR_THRESH)?.uncertainty)
        })?;
        for i in 0..y.n_shots() {
            for (e, v) in y_err.shot_mut(i).iter_mut().zip(y.shot(i)) {
                let (lo, hi) = (v.abs() * min_frac_err, v.abs() * max_frac_err);
                if *e > hi {
                    *e = hi;
                }
                if *e < lo {
                    *e = lo;
                }
            }
        }
        debug!(reference, cutoff, "estimated uncertainty");
        self.history.insert(tag, y_err.clone());
        Ok(Some(y_err))
    }

    /// Result key for a fit of `order`.
    /// Name a fit of `order` is stored under. With `new_name` an unused
    /// name is picked (`_0`, `_1`, ... suffixes) instead of the plain one.
    pub fn fit_name(&self, order: i64, new_name: bool) -> String {
        let order = u8::try_from(order).unwrap_or(0);
        pick_name(self.config.kind.fit_out_name_format(), order, new_name, |n| {
            self.fits.contains_key(n)
        })
    }

    /// The fit stored under the plain name for `order`.
    pub fn fit_result(&self, order: i64) -> Option<&FitResult> {
        self.fits.get(&self.fit_name(order, false))
    }

    /// Fit `y` driven by `u` and store the result under [`Self::fit_name`].
    /// A previous fit of the same order is replaced unless `new_name` is set.
    #[allow(clippy::too_many_arguments)]
    pub fn fit_model(
        &mut self,
        x: &Shots,
        y: &Shots,
        u: &Shots,
        y_err: Option<&Shots>,
        order: i64,
        guess: Vec<Option<f64>>,
        u_is_command: bool,
        units: FitUnits,
        new_name: bool,
    ) -> AppResult<&FitResult> {
        ModelOrder::try_from(order).map_err(|e| AppError::Fit(e.to_string()))?;
        let name = self.fit_name(order, new_name);
        let mut req = FitRequest::new(order, self.scale())
            .named(name.clone())
            .with_guess(guess)
            .with_units(units);
        req.npts = self.config.fit_npts;
        req.method = self.config.fit_method;
        req.nan_policy = self.config.nan_policy;
        req.variable_gain = self.config.variable_gain;
        req.modified_y = self.config.modified_y;
        req.u_is_command = u_is_command;
        let result = fit_response_model(x, y, u, y_err, &req)?;
        self.fits.insert(name.clone(), result);
        Ok(&self.fits[&name])
    }

    /// Parameters, time-domain specs and fit status of each order fitted.
    pub fn fit_report(&self, orders: &[i64], note: &str) -> String {
        let mut lines = Vec::new();
        for &order in orders {
            if let Some(fit) = self.fit_result(order) {
                lines.push(pretty_name(&fit.name));
                if !note.is_empty() {
                    lines.push(note.to_string());
                }
                let mut names = vec![ParamName::Y0, ParamName::Gain, ParamName::Lag, ParamName::Scale];
                if order >= 2 {
                    names.push(ParamName::Damping);
                }
                for name in names {
                    lines.push(format_report_line(
                        name.as_str(),
                        &fit.value(name).into(),
                        fit.units.lookup(name.as_str()),
                        fit.guess_value(name),
                    ));
                }
                lines.push(String::new());

                if let Some(specs) = &fit.time_domain_specs {
                    for (tag, v) in [
                        ("rise_time", specs.rise_time),
                        ("peak_time", specs.peak_time),
                        ("overshoot", specs.overshoot),
                        ("settle_time", specs.settle_time),
                    ] {
                        lines.push(format_report_line(
                            &pretty_name(tag),
                            &v.into(),
                            fit.units.lookup(tag),
                            None,
                        ));
                    }
                    lines.push(String::new());
                }

                let status: [(&str, ReportValue); 6] = [
                    ("fit method", fit.method.as_str().into()),
                    ("Status message (message)", fit.status.message.clone().into()),
                    ("Success (success)", fit.status.success.into()),
                    ("Number of iterations (nit)", fit.status.iterations.into()),
                    ("chi^2 (chisqr)", fit.chisqr.into()),
                    ("reduced chi^2 (redchi)", fit.redchi.into()),
                ];
                for (label, value) in &status {
                    lines.push(format_report_line(label, value, "", None));
                }
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// Case name underlined with dashes, or nothing for an anonymous case.
    pub fn case_header(&self) -> Vec<String> {
        if self.case.is_empty() {
            Vec::new()
        } else {
            vec![self.case.clone(), "-".repeat(self.case.chars().count())]
        }
    }

    pub fn complain(&self, quiet: bool, no_good_news: bool) -> Complaint {
        self.ledger.summarize(quiet, no_good_news, self.class_name)
    }

    pub fn status_line(&self) -> String {
        self.ledger.status_line()
    }

    /// Effective settings, written back into a case.
    pub fn settings(&self) -> CaseConfig {
        let mut cfg = self.config.clone();
        if let Some(s) = &self.smoothing {
            cfg.scale = Some(s.scale);
        }
        if self.uniform_dx.is_some() {
            cfg.uniform_dx = self.uniform_dx;
        }
        if !self.time_units.is_empty() {
            cfg.time_units = Some(self.time_units.clone());
        }
        cfg
    }

    /// Record `Missing basic data` and say so unless quiet.
    pub fn mark_missing_basic_data(&mut self) {
        if !self.config.quiet_dummy {
            warn!(
                class = self.class_name,
                "no x data were supplied; this instance will not be very useful"
            );
        }
        self.ledger.record(MISSING_BASIC_DATA, 8);
    }
}
