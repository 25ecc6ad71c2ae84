use crate::aggregate::CycleReport;
use crate::util::human::fmt_pct;
use serde::Serialize;

/// Result of one cluster's cycle, as handed to the presenters.
#[derive(Debug, Serialize)]
pub struct ClusterOutcome {
    pub name:   String,
    #[serde(flatten)]
    pub report: Option<CycleReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:  Option<String>,
}

/// Generate a human-readable capacity report to a String.
pub fn generate(outcomes: &[ClusterOutcome], with_pools: bool) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════\n");
    out.push_str(&format!("  Ceph Capacity Report — {}\n", now));
    out.push_str("═══════════════════════════════════════════════\n\n");

    for o in outcomes {
        let report = match (&o.report, &o.error) {
            (Some(r), _) => r,
            (None, err) => {
                out.push_str(&format!("── {} ── FAILED: {}\n\n", o.name, err.as_deref().unwrap_or("unknown error")));
                continue;
            }
        };

        out.push_str(&format!("── {} (v{}, {} zone(s)) ─────────────────────\n",
            o.name, report.version, report.zones.len()));
        out.push_str(&format!(
            "  {:<16} {:<20} {:>11} {:>11} {:>11} {:>11} {:>11} {:>7}\n",
            "Zone", "Rule", "Total", "Used", "Avail", "Prov", "Free", "Prov%"
        ));
        out.push_str(&format!("  {}\n", "─".repeat(104)));
        for z in &report.zones {
            out.push_str(&format!(
                "  {:<16} {:<20} {:>11} {:>11} {:>11} {:>11} {:>11} {:>7}\n",
                z.public_name, z.rule_name,
                z.stat.total.to_string(), z.stat.used.to_string(),
                z.stat.available.to_string(), z.stat.provisioned.to_string(),
                z.stat.free.to_string(), fmt_pct(z.provisioned_pct()),
            ));
        }

        if with_pools {
            out.push_str(&format!("\n  {:<24} {:<20} {:>11} {:>11}\n", "Pool", "Rule", "Used", "Prov"));
            for p in &report.pools {
                out.push_str(&format!(
                    "  {:<24} {:<20} {:>11} {:>11}\n",
                    p.name, p.rule_name, p.stat.used.to_string(), p.stat.provisioned.to_string(),
                ));
            }
        }
        out.push('\n');
    }

    out.push_str("═══════════════════════════════════════════════\n");
    out
}

/// Pretty JSON snapshot of every cluster's outcome.
pub fn snapshot(outcomes: &[ClusterOutcome]) -> serde_json::Result<String> {
    let doc = serde_json::json!({
        "timestamp": chrono::Local::now().to_rfc3339(),
        "clusters":  outcomes,
    });
    serde_json::to_string_pretty(&doc)
}
