//! Core data models for Scanwarden

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for security findings
///
/// Variant order is the triage rank: `High` sorts first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Informational,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
            Severity::Informational => write!(f, "Informational"),
        }
    }
}

impl Severity {
    /// Maps an engine risk label onto a severity bucket.
    ///
    /// Anything other than high, medium or low (in any casing) is informational.
    pub fn classify(risk: &str) -> Self {
        match risk.trim().to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Informational,
        }
    }

    /// True for the buckets triage always tries to keep
    pub fn is_elevated(&self) -> bool {
        matches!(self, Severity::High | Severity::Medium)
    }

    /// Returns the HTML color code for reports
    pub fn html_color(&self) -> &str {
        match self {
            Severity::High => "#ea580c",
            Severity::Medium => "#ca8a04",
            Severity::Low => "#2563eb",
            Severity::Informational => "#6b7280",
        }
    }
}

/// An alert exactly as the scan engine reports it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAlert {
    pub name: Option<String>,
    /// Older engine versions only fill this one
    pub alert: Option<String>,
    pub risk: Option<String>,
    pub description: Option<String>,
    pub solution: Option<String>,
    pub url: Option<String>,
    pub param: Option<String>,
    pub evidence: Option<String>,
}

/// A normalized vulnerability record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the finding
    pub name: String,
    /// Severity bucket
    pub severity: Severity,
    /// Detailed description
    pub description: String,
    /// Remediation recommendation
    pub remediation: String,
    /// Affected URL
    pub url: String,
    /// Affected parameter, empty when the alert is page-wide
    pub param: String,
    /// Technical evidence
    pub evidence: String,
}

/// Per-severity counts over the complete finding set plus free-text notes.
///
/// Counts are only written by the aggregator, `phase_notes` only by the
/// phase controller and `note` only by triage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    high: usize,
    medium: usize,
    low: usize,
    informational: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    phase_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

impl Summary {
    pub fn high(&self) -> usize {
        self.high
    }

    pub fn medium(&self) -> usize {
        self.medium
    }

    pub fn low(&self) -> usize {
        self.low
    }

    pub fn informational(&self) -> usize {
        self.informational
    }

    /// Count for one severity bucket
    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Informational => self.informational,
        }
    }

    /// Sum of all four buckets
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low + self.informational
    }

    pub fn phase_notes(&self) -> &[String] {
        &self.phase_notes
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub(crate) fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Informational => self.informational += 1,
        }
    }

    pub(crate) fn push_phase_note(&mut self, note: impl Into<String>) {
        self.phase_notes.push(note.into());
    }

    pub(crate) fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }
}

/// Orchestration state machine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Connecting,
    Discovering,
    PassiveSettling,
    ActiveProbing,
    Collecting,
    Done,
    PartialDone,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Idle => "idle",
            RunState::Connecting => "connecting",
            RunState::Discovering => "discovering",
            RunState::PassiveSettling => "passive settling",
            RunState::ActiveProbing => "active probing",
            RunState::Collecting => "collecting",
            RunState::Done => "done",
            RunState::PartialDone => "partially done",
            RunState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A polled scan phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Discovery,
    ActiveProbing,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Discovery => write!(f, "discovery"),
            PhaseKind::ActiveProbing => write!(f, "active probing"),
        }
    }
}

/// Why a polling loop stopped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PollOutcome {
    Completed,
    Stalled,
    TimedOut,
    SampleError,
    Cancelled,
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PollOutcome::Completed => "completed",
            PollOutcome::Stalled => "stalled",
            PollOutcome::TimedOut => "timed out",
            PollOutcome::SampleError => "status unavailable",
            PollOutcome::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Outcome of one polled phase, folded into the scan result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: PhaseKind,
    pub outcome: PollOutcome,
    /// Last observed progress percentage
    pub progress: u8,
    pub samples: u32,
    pub elapsed_secs: u64,
    /// Sampling error text when `outcome` is a sample error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseReport {
    pub fn completed(&self) -> bool {
        self.outcome == PollOutcome::Completed
    }

    /// Operator note for a phase that stopped short of 100%
    pub fn shortfall_note(&self) -> Option<String> {
        if self.completed() {
            return None;
        }
        let mut note = format!(
            "{} did not complete ({} at {}% after {}s)",
            self.phase, self.outcome, self.progress, self.elapsed_secs
        );
        if let Some(ref err) = self.error {
            note.push_str(&format!(": {err}"));
        }
        Some(note)
    }

    /// How far the phase got, whether or not it finished
    pub fn progress_note(&self) -> String {
        self.shortfall_note().unwrap_or_else(|| {
            format!("{} completed (100% after {}s)", self.phase, self.elapsed_secs)
        })
    }
}

/// Result envelope of one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Unique scan identifier
    pub scan_id: String,
    /// Target URL
    pub target: String,
    /// Scan start time (local timezone)
    pub started_at: DateTime<Local>,
    /// Scan end time (local timezone)
    pub finished_at: Option<DateTime<Local>>,
    /// Terminal state of the run
    pub state: RunState,
    /// Engine version reported during negotiation
    pub engine_version: Option<String>,
    /// All findings, untruncated
    pub findings: Vec<Finding>,
    /// Counts over `findings`; always present, zeroed on failure
    pub summary: Summary,
    /// One entry per polled phase that ran
    pub phases: Vec<PhaseReport>,
    /// Total engine API calls made
    pub engine_requests: u64,
    /// Top-level error for failed runs
    pub error: Option<String>,
}

impl ScanResult {
    /// Creates a new, empty ScanResult
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            target: target.into(),
            started_at: Local::now(),
            finished_at: None,
            state: RunState::Idle,
            engine_version: None,
            findings: Vec::new(),
            summary: Summary::default(),
            phases: Vec::new(),
            engine_requests: 0,
            error: None,
        }
    }

    /// Report for one phase, if it ran
    pub fn phase(&self, phase: PhaseKind) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Marks the scan as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(Severity::classify("HIGH"), Severity::High);
        assert_eq!(Severity::classify("Medium"), Severity::Medium);
        assert_eq!(Severity::classify(" low "), Severity::Low);
        assert_eq!(Severity::classify("Critical"), Severity::Informational);
        assert_eq!(Severity::classify(""), Severity::Informational);
    }

    #[test]
    fn test_severity_rank_order() {
        let mut sevs = vec![
            Severity::Informational,
            Severity::Low,
            Severity::High,
            Severity::Medium,
        ];
        sevs.sort();
        assert_eq!(
            sevs,
            vec![
                Severity::High,
                Severity::Medium,
                Severity::Low,
                Severity::Informational
            ]
        );
    }

    #[test]
    fn test_shortfall_note() {
        let report = PhaseReport {
            phase: PhaseKind::Discovery,
            outcome: PollOutcome::Stalled,
            progress: 40,
            samples: 12,
            elapsed_secs: 110,
            error: None,
        };
        let note = report.shortfall_note().unwrap();
        assert!(note.contains("discovery"));
        assert!(note.contains("40%"));

        let done = PhaseReport {
            outcome: PollOutcome::Completed,
            progress: 100,
            ..report
        };
        assert!(done.shortfall_note().is_none());
    }

    #[test]
    fn test_summary_serializes_zeroed_counts() {
        let json = serde_json::to_value(Summary::default()).unwrap();
        assert_eq!(json["high"], 0);
        assert_eq!(json["informational"], 0);
        assert!(json.get("note").is_none());
    }
}
