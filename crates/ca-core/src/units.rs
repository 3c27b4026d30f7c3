// ca-core/src/units.rs
//
// Signals arrive with free-form unit labels ("kA", "ms", "10^19 m^-3"), so the
// workspace keeps units as strings and only composes them. Time conversions go
// through uom.

use uom::si::f64::Time;
use uom::si::time::{microsecond, millisecond, second};

/// `(u)^-1`, or empty when `u` is empty.
pub fn inverse(u: &str) -> String {
    if u.is_empty() {
        String::new()
    } else {
        format!("({u})^-1")
    }
}

/// `(u)^2`, or empty when `u` is empty.
pub fn squared(u: &str) -> String {
    if u.is_empty() {
        String::new()
    } else {
        format!("({u})^2")
    }
}

/// Space-separated product of the non-empty labels.
pub fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Units of a gain mapping `u` onto `y`. Dimensionless when they match.
pub fn gain_units(y: &str, u: &str) -> String {
    if y == u {
        String::new()
    } else {
        format!("{y} ({u})^-1")
    }
}

/// Missing units become `default`.
pub fn cleanup_units(units: Option<&str>, default: &str) -> String {
    match units {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => default.to_string(),
    }
}

/// Seconds per unit for the recognised time labels.
pub fn seconds_per(units: &str) -> Option<f64> {
    let one = match units.trim() {
        "s" | "sec" | "seconds" => Time::new::<second>(1.0),
        "ms" | "msec" | "milliseconds" => Time::new::<millisecond>(1.0),
        "us" | "µs" | "microseconds" => Time::new::<microsecond>(1.0),
        _ => return None,
    };
    Some(one.get::<second>())
}

/// Convert a duration expressed in `units` to milliseconds.
///
/// Unknown labels are treated as seconds.
pub fn to_ms(v: f64, units: &str) -> f64 {
    let sec = v * seconds_per(units).unwrap_or(1.0);
    Time::new::<second>(sec).get::<millisecond>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composed_labels() {
        assert_eq!(inverse("ms"), "(ms)^-1");
        assert_eq!(inverse(""), "");
        assert_eq!(squared("kA"), "(kA)^2");
        assert_eq!(join(&["(kA)^2", "", "ms"]), "(kA)^2 ms");
        assert_eq!(gain_units("kA", "V"), "kA (V)^-1");
        assert_eq!(gain_units("kA", "kA"), "");
        assert_eq!(cleanup_units(None, "?"), "?");
    }

    #[test]
    fn time_conversion() {
        assert!((to_ms(0.5, "s") - 500.0).abs() < 1e-9);
        assert!((to_ms(2.0, "ms") - 2.0).abs() < 1e-9);
        assert!(seconds_per("furlong").is_none());
    }
}
