use ca_app::{
    Analysis, FetchedSignal, InMemorySource, InputData, SystemIdentification, persist,
};
use ca_case::{AnalysisKind, CaseConfig, ShotSelection, SignalSpec};
use ca_core::linspace;
use ca_models::{Coefficients, ParamName, first_order};
use ca_results::{MemoryTableStore, OverwritePolicy, ResultStore, row};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde_json::json;

const SHOT: i64 = 180520;
const SIGMA: f64 = 0.05;

fn signal(x: &[f64], y: Vec<f64>, units: &str) -> FetchedSignal {
    FetchedSignal {
        x: x.to_vec(),
        y,
        y_units: units.into(),
        x_units: "ms".into(),
    }
}

/// FOPDT step response sampled in ms, as a DIII-D source would serve it.
fn source() -> InMemorySource {
    let t = linspace(0.0, 10.0, 200);
    let u: Vec<f64> = t.iter().map(|&v| if v >= 2.0 { 1.0 } else { 0.0 }).collect();
    let clean = first_order(&t, &u, &Coefficients::first_order(0.0, 2.0, 0.5, 1.0), true);
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, SIGMA).unwrap();
    let y: Vec<f64> = clean.iter().map(|v| v + noise.sample(&mut rng)).collect();
    let ms: Vec<f64> = t.iter().map(|v| v * 1000.0).collect();
    InMemorySource::new()
        .with("prad", SHOT, signal(&ms, y, "MW"))
        .with("prad_cmd", SHOT, signal(&ms, u, "MW"))
        .with("prad_err", SHOT, signal(&ms, vec![SIGMA; 200], "MW"))
}

fn config() -> CaseConfig {
    let mut c = CaseConfig::new(AnalysisKind::SystemIdentification);
    c.device = Some("DIII-D".into());
    c.shot = ShotSelection::One(SHOT);
    c.topic = Some("Prad".into());
    c.time_range = Some((0.0, 10.0));
    c.scale = Some(2.0);
    c.default_order = 1;
    c.with_signal("response", SignalSpec::pointname("prad"))
        .with_signal("command", SignalSpec::pointname("prad_cmd"))
        .with_signal("response_uncertainty", SignalSpec::pointname("prad_err"))
}

fn within(v: f64, target: f64, frac: f64) -> bool {
    (v - target).abs() <= frac * target.abs()
}

#[test]
fn fetched_step_response_is_identified() {
    let mut src = source();
    let mut sysid = SystemIdentification::new(config(), InputData::none(), Some(&mut src)).unwrap();
    assert!(sysid.is_valid());
    assert_eq!(sysid.core.time_units, "s");
    assert_eq!(sysid.core.units_of("response"), "MW");
    assert!(sysid.core.ledger.is_empty(), "{}", sysid.core.status_line());
    assert_eq!(sysid.core.uniform_dx, Some(true));

    let fit = sysid.fit(None, Vec::new(), false).unwrap();
    assert_eq!(fit.name, "order_1_system_identification_fit");
    assert!(fit.u_is_command);
    let gain = fit.value(ParamName::Gain).unwrap();
    let lag = fit.value(ParamName::Lag).unwrap();
    let scale = fit.value(ParamName::Scale).unwrap();
    assert!(within(gain, 2.0, 0.1), "gain {gain}");
    assert!(within(lag, 0.5, 0.15), "lag {lag}");
    assert!(within(scale, 1.0, 0.15), "scale {scale}");

    let report = sysid.report(&[1]);
    assert!(report.starts_with("Prad: DIII-D#180520\n"));
    assert!(report.contains("Order 1 system identification fit"));
    assert!(report.contains("The system identification does not include"));
    assert!(report.contains("reduced chi^2 (redchi)"));
}

#[test]
fn refitting_replaces_unless_a_new_name_is_asked_for() {
    let mut src = source();
    let mut analysis = Analysis::new(config(), InputData::none(), Some(&mut src)).unwrap();
    let keys = |a: &Analysis| a.core().fits.keys().cloned().collect::<Vec<_>>();

    analysis.fit(Some(1), Vec::new(), false).unwrap();
    analysis.fit(Some(1), Vec::new(), false).unwrap();
    assert_eq!(keys(&analysis), ["order_1_system_identification_fit"]);

    let second = analysis.fit(Some(1), vec![None, Some(1.5)], true).unwrap();
    assert_eq!(second.name, "order_1_system_identification_fit_0");
    assert_eq!(second.guess_value(ParamName::Gain), Some(1.5));
    assert_eq!(
        keys(&analysis),
        ["order_1_system_identification_fit", "order_1_system_identification_fit_0"]
    );
    // the plain name still resolves the first fit
    let first = analysis.core().fit_result(1).unwrap();
    assert_eq!(first.name, "order_1_system_identification_fit");
}

#[test]
fn enable_gates_the_command() {
    let mut src = source();
    let t = linspace(0.0, 10000.0, 200);
    let enable: Vec<f64> = t.iter().map(|&v| if v < 5000.0 { 0.0 } else { 1.0 }).collect();
    src.insert("pcs_on", SHOT, signal(&t, enable, ""));
    let mut c = config().with_signal("enable", SignalSpec::pointname("pcs_on"));
    c.enable_value = Some(1.0);
    let sysid = SystemIdentification::new(c, InputData::none(), Some(&mut src)).unwrap();
    let h = &sysid.core.history;
    let x = h.x.as_ref().unwrap().shot(0);
    let cmd = h.get("command").unwrap().shot(0);
    let raw = h.get("raw_command").unwrap().shot(0);
    for ((t, c), r) in x.iter().zip(cmd).zip(raw) {
        if *t < 5.0 {
            assert_eq!(*c, 0.0);
        } else {
            assert_eq!(c, r);
        }
    }
}

#[test]
fn failed_fetch_is_recorded() {
    let mut src = source();
    let c = config().with_signal("command", SignalSpec::pointname("nowhere"));
    let sysid = SystemIdentification::new(c, InputData::none(), Some(&mut src)).unwrap();
    assert_eq!(
        sysid.core.ledger.get("Failed to gather data for command with pointname nowhere"),
        Some(8)
    );
    assert!(sysid.core.history.get("command").is_none());
}

#[test]
fn empty_time_range_leaves_a_dummy() {
    let mut src = source();
    let mut c = config();
    c.time_range = Some((50.0, 60.0));
    let sysid = SystemIdentification::new(c, InputData::none(), Some(&mut src)).unwrap();
    assert!(!sysid.is_valid());
    assert_eq!(sysid.core.ledger.get("No x data found within time range"), Some(8));
    assert_eq!(sysid.core.ledger.get("Missing basic data"), Some(8));
}

#[test]
fn results_are_loaded_into_an_existing_row() {
    let mut src = source();
    let mut analysis = Analysis::new(config(), InputData::none(), Some(&mut src)).unwrap();
    analysis.fit(Some(1), Vec::new(), false).unwrap();

    let mut store = MemoryTableStore::new();
    let keys = row([("controller", json!("Prad")), ("shot", json!(SHOT))]);
    let mut seeded = keys.clone();
    seeded.insert("ctrl_tmin".into(), json!(0.0));
    seeded.insert("ctrl_tmax".into(), json!(10000.0));
    store.insert_row(persist::DIVERTOR_TABLE, seeded).unwrap();

    let out = analysis
        .load_results(&mut store, &[1, 2], None, OverwritePolicy::Abort, None)
        .unwrap();
    assert!(out[&SHOT].row_found);
    let stored = store.fetch_row(persist::DIVERTOR_TABLE, &keys).unwrap().unwrap();
    let gain = stored["o1_sys_gain"].as_f64().unwrap();
    assert!(within(gain, 2.0, 0.1));
    let lag_ms = stored["o1_sys_lag"].as_f64().unwrap();
    assert!(within(lag_ms, 500.0, 0.15), "lag {lag_ms} ms");
    assert_eq!(stored["o1_sys_notes"], json!("Prad; nelder"));
    assert_eq!(stored["o1_sys_shots"], json!([SHOT]));
    assert!(stored.get("o2_sys_gain").is_none());

    let ledger = analysis.ledger();
    assert_eq!(ledger.get("Unable to load missing order 2 fit data to RDB"), Some(2));
    assert!(!ledger.contains(persist::TIME_RANGE_MISMATCH));

    // a second load must not overwrite what is there
    let again = analysis.load_results(&mut store, &[1], None, OverwritePolicy::Abort, None);
    assert!(again.is_err());
}

#[test]
fn loading_flags_missing_rows_and_other_time_ranges() {
    let mut src = source();
    let mut analysis = Analysis::new(config(), InputData::none(), Some(&mut src)).unwrap();
    analysis.fit(Some(1), Vec::new(), false).unwrap();

    let mut store = MemoryTableStore::new();
    let out = analysis
        .load_results(&mut store, &[1], None, OverwritePolicy::Overwrite, None)
        .unwrap();
    assert!(!out[&SHOT].row_found);
    assert_eq!(analysis.ledger().get(persist::MISSING_ROW), Some(5));

    store
        .insert_row(
            persist::DIVERTOR_TABLE,
            row([
                ("controller", json!("Prad")),
                ("shot", json!(SHOT)),
                ("ctrl_tmin", json!(1000.0)),
                ("ctrl_tmax", json!(4000.0)),
            ]),
        )
        .unwrap();
    analysis
        .load_results(&mut store, &[1], None, OverwritePolicy::Overwrite, None)
        .unwrap();
    assert_eq!(analysis.ledger().get(persist::TIME_RANGE_MISMATCH), Some(4));
}
