/// Binary prefixes in escalation order. Scaling stops at the last one.
const UNITS: &[&str] = &["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

/// Scale a raw byte count into a one-decimal magnitude and a unit: (`"1.5"`, `"KiB"`).
///
/// Magnitudes below 1024 are never escalated. Anything still ≥ 1024 once `Zi`
/// is reached is reported in `ZiB` as is.
pub fn scale_bytes(bytes: f64) -> (String, String) {
    let mut b = bytes;
    for (i, unit) in UNITS.iter().enumerate() {
        if b.abs() < 1024.0 || i == UNITS.len() - 1 {
            return (format!("{:.1}", b), format!("{}B", unit));
        }
        b /= 1024.0;
    }
    (format!("{:.1}", b), "ZiB".to_string())
}

/// Format a raw byte count for display: "12.5 GiB"
pub fn fmt_bytes(bytes: f64) -> String {
    let (value, unit) = scale_bytes(bytes);
    format!("{} {}", value, unit)
}

/// Format a percentage with one decimal: "84.5%"
pub fn fmt_pct(pct: f64) -> String {
    format!("{:.1}%", pct)
}

/// `pct` percent of `all`.
pub fn percent_of(pct: f64, all: f64) -> f64 {
    all * pct / 100.0
}
