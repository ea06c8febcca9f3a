//! Raw alert classification and severity counting

use crate::models::{Finding, RawAlert, Severity, Summary};

/// Normalized findings with their counts
#[derive(Debug, Clone, Default)]
pub struct Aggregated {
    pub findings: Vec<Finding>,
    pub summary: Summary,
}

/// Classifies every alert into one of four severity buckets.
///
/// Source fields are kept verbatim; nothing is truncated here.
pub fn aggregate(alerts: &[RawAlert]) -> Aggregated {
    let mut summary = Summary::default();
    let findings = alerts
        .iter()
        .map(|alert| {
            let finding = normalize(alert);
            summary.record(finding.severity);
            finding
        })
        .collect();

    Aggregated { findings, summary }
}

fn normalize(alert: &RawAlert) -> Finding {
    let text = |field: &Option<String>| field.clone().unwrap_or_default();
    Finding {
        name: alert
            .name
            .as_ref()
            .or(alert.alert.as_ref())
            .filter(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string()),
        severity: Severity::classify(alert.risk.as_deref().unwrap_or("Informational")),
        description: text(&alert.description),
        remediation: text(&alert.solution),
        url: text(&alert.url),
        param: text(&alert.param),
        evidence: text(&alert.evidence),
    }
}
