//! Loading fit results and metrics into a results table.

use crate::common::AnalysisCore;
use crate::error::{AppError, AppResult};
use ca_core::{nanmax, nanmin};
use ca_metrics::MetricsBundle;
use ca_models::ParamName;
use ca_results::{OverwritePolicy, PersistOutcome, ResultStore, Row, row, timestamp_now};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Stored times are in ms; analysis times in s.
pub const TIME_UNIT_CONVERT: f64 = 1000.0;

/// Controllers whose results live in [`DIVERTOR_TABLE`].
pub const DIVERTOR_CONTROLLERS: [&str; 2] = ["Detach", "Prad"];

pub const DIVERTOR_TABLE: &str = "divertor_control_settings";

pub const MISSING_ROW: &str = "This case does not exist in the database; unable to load";

pub const TIME_RANGE_MISMATCH: &str = "RDB time range does not match fit range";

/// Where and how results of one analysis are stored.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTarget {
    pub table: String,
    pub controller: String,
    pub notes: String,
}

impl ResultTarget {
    /// Table and controller from the case. The controller defaults to the
    /// topic when that names a divertor controller, else `Detach`.
    pub fn from_core(core: &AnalysisCore) -> AppResult<Self> {
        let cfg = &core.config;
        let default_controller = cfg
            .topic
            .as_deref()
            .filter(|t| DIVERTOR_CONTROLLERS.contains(t))
            .unwrap_or("Detach");
        let controller = cfg
            .rdb
            .controller
            .clone()
            .unwrap_or_else(|| default_controller.to_string());
        let table = match &cfg.rdb.table {
            Some(t) => t.clone(),
            None if DIVERTOR_CONTROLLERS.contains(&controller.as_str()) => DIVERTOR_TABLE.to_string(),
            None => {
                return Err(AppError::InvalidInput(format!(
                    "no results table is known for controller {controller}"
                )));
            }
        };
        let notes = [cfg.topic.as_deref(), Some(cfg.fit_method.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("; ");
        Ok(Self {
            table,
            controller,
            notes,
        })
    }
}

fn missing_order(order: i64) -> String {
    format!("Unable to load missing order {order} fit data to RDB")
}

fn num(v: f64) -> Value {
    if v.is_finite() { json!(v) } else { Value::Null }
}

fn fit_time_range(core: &AnalysisCore, order: i64) -> Value {
    core.fit_result(order).map_or(Value::Null, |f| {
        let x = f.inputs.x.as_flat();
        json!([
            nanmin(x) * TIME_UNIT_CONVERT,
            nanmax(x) * TIME_UNIT_CONVERT
        ])
    })
}

/// Columns for system identification fits: `o{N}_sys_*`.
fn sys_columns(core: &mut AnalysisCore, orders: &[i64], notes: &str) -> Row {
    let shots = core.config.shot.to_vec();
    let mut data = Row::new();
    for &order in orders {
        let Some(fit) = core.fit_result(order) else {
            warn!(order, "no fit to load; run the fit first");
            core.ledger.record(missing_order(order), 2);
            continue;
        };
        let p = |name| fit.value(name).map_or(Value::Null, num);
        let ms = |name| fit.value(name).map_or(Value::Null, |v| num(v * TIME_UNIT_CONVERT));
        let mut cols = vec![
            (format!("o{order}_sys_y0"), p(ParamName::Y0)),
            (format!("o{order}_sys_gain"), p(ParamName::Gain)),
            (format!("o{order}_sys_lag"), ms(ParamName::Lag)),
            (format!("o{order}_sys_scale"), ms(ParamName::Scale)),
        ];
        if order > 1 {
            cols.push((format!("o{order}_sys_damping"), p(ParamName::Damping)));
        }
        cols.extend([
            (format!("o{order}_sys_shots"), json!(shots)),
            (format!("o{order}_sys_time_range"), fit_time_range(core, order)),
            (format!("o{order}_sys_notes"), json!(notes)),
            (format!("o{order}_sys_date"), json!(timestamp_now())),
            (format!("o{order}_sys_redchisq"), num(fit.redchi)),
        ]);
        data.extend(cols.into_iter().filter(|(_, v)| !v.is_null()));
        core.ledger.clear(&missing_order(order));
    }
    data
}

/// Columns for control quality: second order specs and headline metrics.
fn cq_columns(core: &mut AnalysisCore, bundle: Option<&MetricsBundle>) -> Row {
    let order = 2;
    let Some(fit) = core.fit_result(order) else {
        error!("no order 2 fit to load; run the fit first");
        core.ledger.record(missing_order(order), 2);
        return Row::new();
    };
    let specs = fit.time_domain_specs;
    let mut cols = vec![
        ("o2_cq_overshoot", specs.map_or(Value::Null, |s| num(s.overshoot))),
        (
            "o2_cq_settle_time",
            specs.map_or(Value::Null, |s| num(s.settle_time * TIME_UNIT_CONVERT)),
        ),
        ("cq_time_range", fit_time_range(core, order)),
        ("cq_date", json!(timestamp_now())),
        ("o2_cq_redchisq", num(fit.redchi)),
    ];
    if let Some(b) = bundle {
        cols.extend([
            ("cq_rms_error", num(b.raw.rms_error)),
            ("cq_data_units", json!(b.raw.units.rms_error)),
            (
                "o2_cq_gain_error",
                b.normalized.gain_error.get(&2).map_or(Value::Null, |g| num(*g)),
            ),
        ]);
    }
    core.ledger.clear(&missing_order(order));
    row(cols.into_iter().filter(|(_, v)| !v.is_null()))
}

/// Write results for every shot of the case into its table.
///
/// Rows are matched on controller and shot and must already exist. A stored
/// `ctrl_tmin`/`ctrl_tmax` that differs from the case time range is flagged
/// in the ledger but does not stop the update.
pub fn load_results(
    core: &mut AnalysisCore,
    bundle: Option<&MetricsBundle>,
    store: &mut dyn ResultStore,
    orders: &[i64],
    tag: Option<&str>,
    policy: OverwritePolicy,
    extra: Option<Row>,
) -> AppResult<BTreeMap<i64, PersistOutcome>> {
    let target = ResultTarget::from_core(core)?;
    let tag = tag.map_or_else(|| core.config.rdb_tag(), str::to_string);
    let mut data = match tag.as_str() {
        "sys" => sys_columns(core, orders, &target.notes),
        "cq" => cq_columns(core, bundle),
        other => {
            core.ledger
                .record(format!("Failed to load to unrecognized category/tag {other} to RDB"), 2);
            Row::new()
        }
    };
    if let Some(extra) = extra {
        data.extend(extra);
    }
    if data.is_empty() {
        return Err(AppError::MissingData {
            what: "no results to load; run fits to generate them".to_string(),
        });
    }

    let tr = core
        .config
        .time_range
        .map(|(t0, t1)| [t0 * TIME_UNIT_CONVERT, t1 * TIME_UNIT_CONVERT]);
    let mut outcomes = BTreeMap::new();
    for shot in core.config.shot.to_vec() {
        let keys = row([("controller", json!(target.controller)), ("shot", json!(shot))]);
        match store.fetch_row(&target.table, &keys)? {
            None => {
                error!(table = %target.table, shot, controller = %target.controller, "no entry found");
                core.ledger.record(MISSING_ROW, 5);
            }
            Some(existing) => {
                let stored = [existing.get("ctrl_tmin"), existing.get("ctrl_tmax")]
                    .map(|v| v.and_then(Value::as_f64));
                let matches = match (stored, tr) {
                    ([Some(a), Some(b)], Some([t0, t1])) => a == t0 && b == t1,
                    _ => false,
                };
                if !matches {
                    error!(shot, ?stored, fit_range = ?tr, "stored time range doesn't match");
                    core.ledger.record(TIME_RANGE_MISMATCH, 4);
                }
            }
        }
        let outcome = store.persist(&target.table, &keys, &data, policy)?;
        info!(shot, written = outcome.written.len(), kept = outcome.kept.len(), "results loaded");
        outcomes.insert(shot, outcome);
    }
    Ok(outcomes)
}
