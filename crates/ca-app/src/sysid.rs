//! System identification: fit how the response follows the command.

use crate::common::AnalysisCore;
use crate::error::{AppError, AppResult};
use crate::history::InputData;
use crate::ledger::Complaint;
use crate::source::SignalSource;
use ca_case::CaseConfig;
use ca_fit::{FitResult, FitUnits};
use tracing::info;

pub const SYSID_NOTE: &str = "    The command may be generated by a feedback control system.\n    The system identification does not include the system which generated the command.";

#[derive(Clone, Debug)]
pub struct SystemIdentification {
    pub core: AnalysisCore,
}

impl SystemIdentification {
    pub const CLASS_NAME: &'static str = "SystemIdentification";

    /// Set up from supplied data, fetching whatever is missing.
    ///
    /// Without x the instance is a degraded dummy: `Missing basic data` is
    /// recorded and only reporting works.
    pub fn new(
        config: CaseConfig,
        data: InputData,
        mut source: Option<&mut (dyn SignalSource + '_)>,
    ) -> AppResult<Self> {
        let mut core = AnalysisCore::new(config, Self::CLASS_NAME);
        core.load_input(data);
        core.fetch_all(
            source.as_deref_mut(),
            &["response", "command", "target", "enable", "response_uncertainty"],
        );

        if let (Some(enable), Some(value)) = (core.history.get("enable").cloned(), core.config.enable_value)
            && let Some(command) = core.history.get("command").cloned()
        {
            let gated = command.zip_with(&enable, |c, e| if e == value { c } else { 0.0 })?;
            core.history.insert("raw_command", command);
            core.history.insert("command", gated);
        }

        if core.history.has_x() {
            core.setup_calcs();
            core.setup_smooth("response")?;
            if core.config.smooth_response {
                core.smooth_quantity("response", source.as_deref_mut())?;
            }
            if !core.history.contains("response_uncertainty") {
                let (lo, hi) = (core.config.min_frac_err, core.config.max_frac_err);
                core.estimate_uncertainty("response", lo, hi)?;
            }
        } else {
            core.mark_missing_basic_data();
        }

        let quiet = core.config.quiet_dummy;
        core.complain(quiet, true);
        info!(case = %core.case, status = %core.status_line(), "system identification ready");
        Ok(Self { core })
    }

    pub fn is_valid(&self) -> bool {
        self.core.history.has_x()
    }

    /// Fit the response to the command. `order` defaults to the case's.
    ///
    /// The fit replaces any earlier one of the same order unless `new_name`
    /// asks for a fresh name.
    pub fn fit(
        &mut self,
        order: Option<i64>,
        guess: Vec<Option<f64>>,
        new_name: bool,
    ) -> AppResult<&FitResult> {
        let order = order.unwrap_or(self.core.config.default_order);
        let h = &self.core.history;
        let (Some(x), Some(y), Some(u)) = (h.x.clone(), h.get("response").cloned(), h.get("command").cloned())
        else {
            return Err(AppError::MissingData {
                what: "system identification needs x, response and command".to_string(),
            });
        };
        let y_err = h.get("response_uncertainty").cloned();
        let units = FitUnits {
            x: self.core.time_units.clone(),
            y: self.core.units_of("response"),
            u: self.core.units_of("command"),
        };
        self.core
            .fit_model(&x, &y, &u, y_err.as_ref(), order, guess, true, units, new_name)
    }

    pub fn report(&self, orders: &[i64]) -> String {
        let mut lines = self.core.case_header();
        lines.push(self.core.fit_report(orders, SYSID_NOTE));
        lines.join("\n")
    }

    pub fn complain(&self, quiet: bool, no_good_news: bool) -> Complaint {
        self.core.complain(quiet, no_good_news)
    }
}
