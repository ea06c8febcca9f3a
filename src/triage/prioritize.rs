//! Risk-ordered selection and text trimming for presentation

use crate::models::{Finding, Summary};

/// Findings shown when no limit is configured
pub const DEFAULT_MAX_FINDINGS: usize = 15;

/// Longest description kept in a shown finding, marker included
pub const DESCRIPTION_LIMIT: usize = 200;

/// Longest remediation text kept in a shown finding, marker included
pub const REMEDIATION_LIMIT: usize = 150;

const ELLIPSIS: &str = "...";

/// The bounded view handed to report rendering
#[derive(Debug, Clone)]
pub struct Triaged {
    pub findings: Vec<Finding>,
    pub summary: Summary,
}

/// Orders findings by severity and keeps at most `max` of them.
///
/// High and medium findings are kept first; low and informational ones only
/// fill what capacity is left. Summary counts pass through untouched.
pub fn triage(findings: &[Finding], mut summary: Summary, max: usize) -> Triaged {
    let mut ordered: Vec<&Finding> = findings.iter().collect();
    // stable: ties keep engine order
    ordered.sort_by_key(|f| f.severity);

    let (elevated, rest): (Vec<&Finding>, Vec<&Finding>) =
        ordered.into_iter().partition(|f| f.severity.is_elevated());

    let selected: Vec<&Finding> = if elevated.len() >= max {
        elevated.into_iter().take(max).collect()
    } else {
        let room = max - elevated.len();
        elevated
            .into_iter()
            .chain(rest.into_iter().take(room))
            .collect()
    };

    let shown: Vec<Finding> = selected.into_iter().map(trim_for_display).collect();

    let total = findings.len();
    let note = (shown.len() < total).then(|| {
        format!(
            "Showing {} of {} vulnerabilities. Prioritized by risk level.",
            shown.len(),
            total
        )
    });
    summary.set_note(note);

    Triaged {
        findings: shown,
        summary,
    }
}

fn trim_for_display(finding: &Finding) -> Finding {
    Finding {
        description: truncate(&finding.description, DESCRIPTION_LIMIT),
        remediation: truncate(&finding.remediation, REMEDIATION_LIMIT),
        ..finding.clone()
    }
}

/// Cuts `text` to `limit` characters, the last three being the marker
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
