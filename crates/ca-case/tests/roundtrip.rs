use ca_case::*;

fn sample_case() -> CaseConfig {
    let mut case = CaseConfig::new(AnalysisKind::ControlQuality)
        .with_signal("measurement", SignalSpec::pointname("prad_tot"))
        .with_signal(
            "target",
            SignalSpec {
                pointname: "prad_target".to_string(),
                treename: Some("pcs".to_string()),
                x_factor: 1.0,
                y_factor: 1e-6,
                units: Some("MW".to_string()),
            },
        );
    case.device = Some("DIII-D".to_string());
    case.shot = ShotSelection::Many(vec![180520, 180521]);
    case.topic = Some("Prad".to_string());
    case.time_range = Some((2.0, 4.5));
    case.xwin = vec![(2.0, 3.0), (3.0, 4.5)];
    case.scale = Some(0.05);
    case.enable_value = Some(1.0);
    case.rdb.controller = Some("Prad".to_string());
    case
}

#[test]
fn roundtrip_yaml_case() {
    let case = sample_case();
    let path = std::env::temp_dir().join("ca_case_roundtrip.yaml");
    save_yaml(&path, &case).unwrap();
    let loaded = load_case(&path).unwrap();
    assert_eq!(case, loaded);
}

#[test]
fn roundtrip_json_case() {
    let case = sample_case();
    let path = std::env::temp_dir().join("ca_case_roundtrip.json");
    save_json(&path, &case).unwrap();
    let loaded = load_case(&path).unwrap();
    assert_eq!(case, loaded);
}

#[test]
fn save_refuses_invalid_cases() {
    let mut case = sample_case();
    case.time_range = Some((5.0, 1.0));
    let path = std::env::temp_dir().join("ca_case_invalid.yaml");
    assert!(matches!(save_yaml(&path, &case), Err(CaseError::Validation(_))));
}

#[test]
fn roundtrip_signal_file() {
    let mut file = SignalFile::default();
    file.insert(
        "prad_tot",
        180520,
        SignalTrace {
            x: vec![0.0, 1.0, 2.0],
            y: vec![1.0, 2.0, 3.0],
            units: Some("MW".to_string()),
            x_units: Some("ms".to_string()),
        },
    );
    for name in ["ca_signals_roundtrip.yaml", "ca_signals_roundtrip.json"] {
        let path = std::env::temp_dir().join(name);
        save_signals(&path, &file).unwrap();
        assert_eq!(load_signals(&path).unwrap(), file);
    }
    assert!(file.get("prad_tot", 180520).is_some());
    assert!(file.get("prad_tot", 1).is_none());
}
