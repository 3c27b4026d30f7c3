//! The two analyses behind one interface.

use crate::common::AnalysisCore;
use crate::error::AppResult;
use crate::history::InputData;
use crate::ledger::{Complaint, ProblemLedger};
use crate::persist::load_results;
use crate::quality::ControlQuality;
use crate::source::SignalSource;
use crate::sysid::SystemIdentification;
use ca_case::{AnalysisKind, CaseConfig};
use ca_fit::FitResult;
use ca_metrics::MetricsBundle;
use ca_results::{OverwritePolicy, PersistOutcome, ResultStore, Row};
use std::collections::BTreeMap;

/// Orders reported and loaded when none are named.
pub const DEFAULT_REPORT_ORDERS: [i64; 2] = [1, 2];

#[derive(Clone, Debug)]
pub enum Analysis {
    SystemIdentification(SystemIdentification),
    ControlQuality(ControlQuality),
}

impl Analysis {
    /// Build the analysis the case asks for.
    pub fn new(
        config: CaseConfig,
        data: InputData,
        source: Option<&mut (dyn SignalSource + '_)>,
    ) -> AppResult<Self> {
        Ok(match config.kind {
            AnalysisKind::SystemIdentification => {
                Analysis::SystemIdentification(SystemIdentification::new(config, data, source)?)
            }
            AnalysisKind::ControlQuality => {
                Analysis::ControlQuality(ControlQuality::new(config, data, source))
            }
        })
    }

    pub fn core(&self) -> &AnalysisCore {
        match self {
            Analysis::SystemIdentification(a) => &a.core,
            Analysis::ControlQuality(a) => &a.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut AnalysisCore {
        match self {
            Analysis::SystemIdentification(a) => &mut a.core,
            Analysis::ControlQuality(a) => &mut a.core,
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        self.core().config.kind
    }

    pub fn quantities_needed(&self) -> &'static [&'static str] {
        self.kind().quantities()
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Analysis::SystemIdentification(a) => a.is_valid(),
            Analysis::ControlQuality(a) => a.is_valid(),
        }
    }

    /// Fit the default model of each analysis. Control quality fits are
    /// never forced here. `new_name` keeps an earlier fit of the same order.
    pub fn fit(
        &mut self,
        order: Option<i64>,
        guess: Vec<Option<f64>>,
        new_name: bool,
    ) -> AppResult<&FitResult> {
        match self {
            Analysis::SystemIdentification(a) => a.fit(order, guess, new_name),
            Analysis::ControlQuality(a) => {
                let order = order.unwrap_or(a.core.config.default_order);
                a.fit(order, guess, false, new_name)
            }
        }
    }

    /// Control quality metrics, one bundle per shot.
    pub fn metrics(&self) -> Option<&[MetricsBundle]> {
        match self {
            Analysis::SystemIdentification(_) => None,
            Analysis::ControlQuality(a) => a.metrics.as_deref(),
        }
    }

    pub fn complain(&self, quiet: bool, no_good_news: bool) -> Complaint {
        self.core().complain(quiet, no_good_news)
    }

    pub fn ledger(&self) -> &ProblemLedger {
        &self.core().ledger
    }

    pub fn case(&self) -> &str {
        &self.core().case
    }

    pub fn settings(&self) -> CaseConfig {
        match self {
            Analysis::SystemIdentification(a) => a.core.settings(),
            Analysis::ControlQuality(a) => a.settings(),
        }
    }

    pub fn report(&self, orders: &[i64]) -> String {
        match self {
            Analysis::SystemIdentification(a) => a.report(orders),
            Analysis::ControlQuality(a) => a.report(orders),
        }
    }

    /// Load results into `store`; see [`load_results`].
    pub fn load_results(
        &mut self,
        store: &mut dyn ResultStore,
        orders: &[i64],
        tag: Option<&str>,
        policy: OverwritePolicy,
        extra: Option<Row>,
    ) -> AppResult<BTreeMap<i64, PersistOutcome>> {
        match self {
            Analysis::SystemIdentification(a) => {
                load_results(&mut a.core, None, store, orders, tag, policy, extra)
            }
            Analysis::ControlQuality(a) => {
                let bundle = a.metrics.as_ref().and_then(|b| b.first());
                load_results(&mut a.core, bundle, store, orders, tag, policy, extra)
            }
        }
    }
}
