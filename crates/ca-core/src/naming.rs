//! Case descriptions and result keys.

/// Replace characters that cannot appear in a result key.
pub fn sanitize_key(key: &str) -> String {
    key.replace('/', "_|_")
}

/// Describe the analysed case, e.g. `"beta control: DIII-D#180000"`.
///
/// Multiple shots are listed comma-separated.
pub fn describe_case(topic: Option<&str>, device: Option<&str>, shots: &[i64]) -> String {
    let shot = match shots {
        [] => None,
        [s] => Some(s.to_string()),
        many => Some(
            many.iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
    };
    let dv = match (device, shot) {
        (None, None) => String::new(),
        (None, Some(s)) => format!("#{s}"),
        (Some(d), None) => d.to_uppercase(),
        (Some(d), Some(s)) => format!("{}#{s}", d.to_uppercase()),
    };
    match topic {
        Some(t) => format!("{}: {dv}", sanitize_key(t)),
        None => dv,
    }
}

/// Fill `{order}` in a name format.
pub fn format_order(format: &str, order: u8) -> String {
    format.replace("{order}", &order.to_string())
}

/// Pick a result name; with `new_name`, append `_0`, `_1`, ... until unused.
pub fn pick_name(format: &str, order: u8, new_name: bool, taken: impl Fn(&str) -> bool) -> String {
    let name0 = format_order(format, order);
    if !new_name {
        return name0;
    }
    let mut name = name0.clone();
    let mut i = 0;
    while taken(&name) {
        name = format!("{name0}_{i}");
        i += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_variants() {
        assert_eq!(describe_case(Some("beta"), Some("diii-d"), &[180000]), "beta: DIII-D#180000");
        assert_eq!(describe_case(None, None, &[]), "");
        assert_eq!(describe_case(None, None, &[5]), "#5");
        assert_eq!(describe_case(Some("a/b"), Some("east"), &[]), "a_|_b: EAST");
        assert_eq!(describe_case(None, Some("d3d"), &[1, 2]), "D3D#1,2");
    }

    #[test]
    fn unique_names() {
        let taken = ["order_1_fit", "order_1_fit_0"];
        let is_taken = |n: &str| taken.contains(&n);
        assert_eq!(pick_name("order_{order}_fit", 1, false, is_taken), "order_1_fit");
        assert_eq!(pick_name("order_{order}_fit", 1, true, is_taken), "order_1_fit_1");
        assert_eq!(pick_name("order_{order}_fit", 2, true, is_taken), "order_2_fit");
    }
}
