use logster_core::Metric;

/// Format a metric as a structured JSON line.
/// Output: `{"name":"logins_count","value":3.0,"unit_label":"Logins per minute"}`
pub fn format_structured(metric: &Metric) -> String {
    serde_json::json!({
        "name": metric.name(),
        "value": metric.value(),
        "unit_label": metric.unit_label(),
    })
    .to_string()
}

/// Format a metric as plain text.
/// Output: `logins_count 3 Logins per minute`
pub fn format_plain(metric: &Metric) -> String {
    format!("{} {} {}", metric.name(), format_value(metric.value()), metric.unit_label())
}

/// Whole numbers print without a fractional part, everything else as the
/// shortest decimal that round-trips.
pub fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_structured() {
        let m = Metric::new("ediauth_count.200", 3.0, "Logins per minute");
        let v: serde_json::Value = serde_json::from_str(&format_structured(&m)).unwrap();
        assert_eq!(v["name"], "ediauth_count.200");
        assert_eq!(v["value"], 3.0);
        assert_eq!(v["unit_label"], "Logins per minute");
    }

    #[test]
    fn test_format_plain() {
        let m = Metric::new("os_response", 3.0, "Avg Response Time per minute");
        assert_eq!(format_plain(&m), "os_response 3 Avg Response Time per minute");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(12.0), "12");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(0.0004), "0.0004");
        assert_eq!(format_value(1.0 / 3.0), "0.3333333333333333");
        assert_eq!(format_value(f64::NAN), "NaN");
    }
}
