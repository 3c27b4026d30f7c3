use ca_case::*;

fn field_of(err: ValidationError) -> String {
    match err {
        ValidationError::InvalidValue { field, .. } => field,
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn defaults_are_valid() {
    validate_case(&CaseConfig::new(AnalysisKind::SystemIdentification)).unwrap();
    validate_case(&CaseConfig::new(AnalysisKind::ControlQuality)).unwrap();
}

#[test]
fn inverted_ranges_are_rejected() {
    let mut case = CaseConfig::new(AnalysisKind::ControlQuality);
    case.time_range = Some((1.0, 1.0));
    assert_eq!(field_of(validate_case(&case).unwrap_err()), "time_range");

    let mut case = CaseConfig::new(AnalysisKind::ControlQuality);
    case.xwin = vec![(0.0, 1.0), (3.0, 2.0)];
    assert_eq!(field_of(validate_case(&case).unwrap_err()), "xwin[1]");
}

#[test]
fn bad_numbers_are_rejected() {
    let mut case = CaseConfig::new(AnalysisKind::SystemIdentification);
    case.scale = Some(0.0);
    assert_eq!(field_of(validate_case(&case).unwrap_err()), "scale");

    let mut case = CaseConfig::new(AnalysisKind::SystemIdentification);
    case.fit_npts = 0;
    assert_eq!(field_of(validate_case(&case).unwrap_err()), "fit_npts");

    let mut case = CaseConfig::new(AnalysisKind::SystemIdentification);
    case.default_order = 4;
    assert_eq!(field_of(validate_case(&case).unwrap_err()), "default_order");

    let mut case = CaseConfig::new(AnalysisKind::SystemIdentification);
    case.min_frac_err = 0.5;
    assert_eq!(field_of(validate_case(&case).unwrap_err()), "min_frac_err");
}

#[test]
fn signals_must_belong_to_the_analysis() {
    let case = CaseConfig::new(AnalysisKind::SystemIdentification)
        .with_signal("measurement", SignalSpec::pointname("x"));
    assert!(matches!(
        validate_case(&case),
        Err(ValidationError::UnknownQuantity { .. })
    ));

    let mut spec = SignalSpec::pointname("x");
    spec.y_factor = 0.0;
    let case = CaseConfig::new(AnalysisKind::SystemIdentification).with_signal("response", spec);
    assert_eq!(field_of(validate_case(&case).unwrap_err()), "signals.response.y_factor");
}

#[test]
fn future_versions_are_rejected() {
    let mut case = CaseConfig::new(AnalysisKind::ControlQuality);
    case.version = LATEST_VERSION + 1;
    assert!(matches!(
        validate_case(&case),
        Err(ValidationError::UnsupportedVersion { .. })
    ));
}

#[test]
fn ragged_traces_are_rejected() {
    let mut file = SignalFile::default();
    file.insert(
        "p",
        1,
        SignalTrace {
            x: vec![0.0, 1.0],
            y: vec![0.0],
            units: None,
            x_units: None,
        },
    );
    assert_eq!(field_of(validate_signal_file(&file).unwrap_err()), "signals.p.1");
}
