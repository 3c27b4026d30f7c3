//! Fixed-width report lines.

use std::fmt;

/// A value on one report line.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportValue {
    Text(Option<String>),
    Int(i64),
    Bool(bool),
    Float(f64),
}

impl From<f64> for ReportValue {
    fn from(v: f64) -> Self {
        ReportValue::Float(v)
    }
}

impl From<bool> for ReportValue {
    fn from(v: bool) -> Self {
        ReportValue::Bool(v)
    }
}

impl From<i64> for ReportValue {
    fn from(v: i64) -> Self {
        ReportValue::Int(v)
    }
}

impl From<u64> for ReportValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(ReportValue::Float(v as f64), ReportValue::Int)
    }
}

impl From<&str> for ReportValue {
    fn from(v: &str) -> Self {
        ReportValue::Text(Some(v.to_string()))
    }
}

impl From<String> for ReportValue {
    fn from(v: String) -> Self {
        ReportValue::Text(Some(v))
    }
}

impl From<Option<f64>> for ReportValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(ReportValue::Text(None), ReportValue::Float)
    }
}

impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

/// `+1.234e+04`: exponent with a sign and at least two digits.
pub fn sci(v: f64, precision: usize) -> String {
    if v.is_nan() {
        return "+nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+inf" } else { "-inf" }.to_string();
    }
    let s = format!("{v:+.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let e: i32 = exp.parse().unwrap_or(0);
            let sign = if e < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", e.abs())
        }
        None => s,
    }
}

fn format_value(value: &ReportValue) -> String {
    match value {
        ReportValue::Text(t) => format!("{:12}", t.as_deref().unwrap_or("N/A")),
        ReportValue::Bool(b) => format!("{:+4}        ", i64::from(*b)),
        ReportValue::Int(i) if i.abs() <= 999 => format!("{i:+4}        "),
        ReportValue::Int(i) => format!("{:>12}", sci(*i as f64, 3)),
        ReportValue::Float(x) => {
            let x = *x;
            if x == 0.0 {
                format!("{x:4.0}         ")
            } else if x.is_nan() {
                format!("{:>8}     ", "N/A")
            } else if x.abs() >= 999.0 || x.abs() < 1e-2 {
                format!("{:>12}", sci(x, 3))
            } else {
                format!("{x:+8.3}     ")
            }
        }
    }
}

/// `label = value units`, right-aligning the label in 40 columns.
///
/// Large and tiny numbers switch to exponent notation and NaN shows as
/// `N/A`. A guess, when given, is appended.
pub fn format_report_line(label: &str, value: &ReportValue, units: &str, guess: Option<f64>) -> String {
    let mut line = format!("{label:>40} = {} {units:10}", format_value(value));
    if let Some(g) = guess {
        let g = if g.is_nan() { "+nan".to_string() } else { format!("{g:+.3}") };
        line.push_str(&format!("  (guess = {g})"));
    }
    line
}

/// `order_2_response_to_target` → `Order 2 response to target`.
pub fn pretty_name(name: &str) -> String {
    let s = name.replace('_', " ");
    let s = s.trim();
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_part(line: &str) -> &str {
        line.split_once(" = ").map(|(_, v)| v).unwrap_or("")
    }

    #[test]
    fn float_formats() {
        let l = format_report_line("gain", &ReportValue::Float(1.5), "kA", None);
        assert_eq!(l, format!("{:>40} =   +1.500      kA        ", "gain"));
        assert_eq!(value_part(&format_report_line("x", &0.0.into(), "", None)).trim(), "0");
        assert_eq!(value_part(&format_report_line("x", &12340.0.into(), "", None)).trim(), "+1.234e+04");
        assert_eq!(value_part(&format_report_line("x", &0.001.into(), "", None)).trim(), "+1.000e-03");
        assert_eq!(value_part(&format_report_line("x", &f64::NAN.into(), "", None)).trim(), "N/A");
    }

    #[test]
    fn ints_bools_and_text() {
        assert!(format_report_line("n", &ReportValue::Int(42), "", None).contains("=  +42 "));
        assert!(format_report_line("ok", &true.into(), "", None).contains("=   +1 "));
        let l = format_report_line("fit method", &"nelder".into(), "", None);
        assert_eq!(value_part(&l), format!("{:12} {:10}", "nelder", ""));
    }

    #[test]
    fn guess_is_appended() {
        let l = format_report_line("lag", &0.5.into(), "s", Some(0.25));
        assert!(l.ends_with("  (guess = +0.250)"));
    }

    #[test]
    fn pretty_names() {
        assert_eq!(pretty_name("order_2_response_to_target"), "Order 2 response to target");
        assert_eq!(pretty_name("rise_time"), "Rise time");
    }
}
