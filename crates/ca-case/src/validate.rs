//! Case and signal-file validation.

use crate::schema::CaseConfig;
use crate::signals::SignalFile;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown quantity: {name} (expected one of {expected})")]
    UnknownQuantity { name: String, expected: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_case(case: &CaseConfig) -> Result<(), ValidationError> {
    if case.version > crate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: case.version,
        });
    }

    if let Some((t0, t1)) = case.time_range
        && !(t0 < t1)
    {
        return Err(invalid("time_range", format!("[{t0}, {t1}]"), "start must be before end"));
    }
    for (i, &(t0, t1)) in case.xwin.iter().enumerate() {
        if !(t0 < t1) {
            return Err(invalid(
                format!("xwin[{i}]"),
                format!("[{t0}, {t1}]"),
                "start must be before end",
            ));
        }
    }

    if let Some(scale) = case.scale
        && !(scale.is_finite() && scale > 0.0)
    {
        return Err(invalid("scale", scale, "must be positive and finite"));
    }
    if case.fit_npts < 2 {
        return Err(invalid("fit_npts", case.fit_npts, "must be at least 2"));
    }
    if !(1..=3).contains(&case.default_order) {
        return Err(invalid("default_order", case.default_order, "supported orders are 1, 2 and 3"));
    }
    if case.median_filter_max_steps == 0 {
        return Err(invalid("median_filter_max_steps", 0, "must be positive"));
    }

    for (field, v) in [("min_frac_err", case.min_frac_err), ("max_frac_err", case.max_frac_err)] {
        if !(v.is_finite() && v >= 0.0) {
            return Err(invalid(field, v, "must be non-negative and finite"));
        }
    }
    if case.min_frac_err > case.max_frac_err {
        return Err(invalid(
            "min_frac_err",
            case.min_frac_err,
            "must not exceed max_frac_err",
        ));
    }

    if let Some(f) = case.overall_x_factor
        && !(f.is_finite() && f != 0.0)
    {
        return Err(invalid("overall_x_factor", f, "must be finite and non-zero"));
    }
    if !(case.overall_y_factor.is_finite() && case.overall_y_factor != 0.0) {
        return Err(invalid("overall_y_factor", case.overall_y_factor, "must be finite and non-zero"));
    }

    let known = case.kind.quantities();
    for (name, spec) in &case.signals {
        if !known.contains(&name.as_str()) {
            return Err(ValidationError::UnknownQuantity {
                name: name.clone(),
                expected: known.join(", "),
            });
        }
        for (what, v) in [("x_factor", spec.x_factor), ("y_factor", spec.y_factor)] {
            if !(v.is_finite() && v != 0.0) {
                return Err(invalid(format!("signals.{name}.{what}"), v, "must be finite and non-zero"));
            }
        }
    }

    Ok(())
}

pub fn validate_signal_file(file: &SignalFile) -> Result<(), ValidationError> {
    for (name, shots) in &file.signals {
        for (shot, trace) in shots {
            if trace.x.len() != trace.y.len() {
                return Err(invalid(
                    format!("signals.{name}.{shot}"),
                    format!("{} x / {} y", trace.x.len(), trace.y.len()),
                    "x and y must have the same length",
                ));
            }
        }
    }
    Ok(())
}
