use ca_core::linspace;
use ca_metrics::{calc_standard_metrics, calculate_standard_metrics};
use proptest::prelude::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn full_range_window_matches_the_whole_series(
        err in prop::collection::vec(-5.0f64..5.0, 3..120),
        t0 in -3.0f64..3.0,
        span in 0.5f64..20.0,
        norm in 0.01f64..10.0,
    ) {
        let x = linspace(t0, t0 + span, err.len());
        let full = (x[0], x[x.len() - 1]);
        let m = calculate_standard_metrics(&x, &err, norm, 1.0 / span, &[full]);
        let w = &m.windowed[0];
        prop_assert!(close(w.raw.integral_square_error, m.raw.integral_square_error));
        prop_assert!(close(w.raw.integral_absolute_error, m.raw.integral_absolute_error));
        prop_assert!(close(w.raw.integral_time_absolute_error, m.raw.integral_time_absolute_error));
        prop_assert!(close(w.normalized.integral_square_error, m.normalized.integral_square_error));
        prop_assert!(close(
            w.normalized.integral_time_absolute_error,
            m.normalized.integral_time_absolute_error
        ));
    }

    #[test]
    fn windows_never_exceed_the_whole(
        err in prop::collection::vec(-5.0f64..5.0, 5..80),
        a in 0.0f64..0.5,
        b in 0.5f64..1.0,
    ) {
        let x = linspace(0.0, 1.0, err.len());
        let m = calculate_standard_metrics(&x, &err, 1.0, 1.0, &[(a, b)]);
        let w = &m.windowed[0];
        // an empty window gives NaN
        prop_assert!(!(w.raw.integral_absolute_error > m.raw.integral_absolute_error + 1e-12));
        prop_assert!(!(w.raw.integral_square_error > m.raw.integral_square_error + 1e-12));
    }
}

#[test]
fn normalised_integrals_scale_with_the_norms() {
    let x = linspace(0.0, 4.0, 41);
    let err: Vec<f64> = x.iter().map(|t| (t * 1.3).sin()).collect();
    let m = calculate_standard_metrics(&x, &err, 2.0, 0.25, &[]);
    let (raw, _) = calc_standard_metrics(&x, &err);
    assert!(m.windowed.is_empty());
    assert!(close(m.normalized.integral_square_error, raw.integral_square_error * 4.0 * 0.25));
    assert!(close(m.normalized.integral_absolute_error, raw.integral_absolute_error * 2.0 * 0.25));
    assert!(close(
        m.normalized.integral_time_absolute_error,
        raw.integral_time_absolute_error * 2.0 * 0.25 * 0.25
    ));
}
