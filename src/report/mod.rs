//! Report assembly and rendering

pub mod html;
pub mod json;
pub mod pdf;

pub use pdf::PdfConverter;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::models::{Finding, PhaseReport, RunState, ScanResult, Summary};
use crate::triage::triage;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Html,
    Pdf,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Fingerprint section: detected technologies or why there are none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frameworks {
    Detected(Fingerprint),
    Unavailable { error: String },
}

impl From<Result<Fingerprint>> for Frameworks {
    fn from(result: Result<Fingerprint>) -> Self {
        match result {
            Ok(fp) => Frameworks::Detected(fp),
            Err(e) => Frameworks::Unavailable {
                error: e.to_string(),
            },
        }
    }
}

/// Everything a renderer needs, with findings already triaged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub target: String,
    pub scan_id: String,
    pub scan_date: String,
    pub state: RunState,
    pub error: Option<String>,
    pub engine_version: Option<String>,
    pub frameworks: Frameworks,
    pub phases: Vec<PhaseReport>,
    pub total_findings: usize,
    pub vulnerabilities: Vec<Finding>,
    pub summary: Summary,
}

impl ReportData {
    /// Triages `result` down to `max_findings` and captures the report fields
    pub fn assemble(result: &ScanResult, frameworks: Frameworks, max_findings: usize) -> Self {
        let triaged = triage(&result.findings, result.summary.clone(), max_findings);
        Self {
            target: result.target.clone(),
            scan_id: result.scan_id.clone(),
            scan_date: result.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            state: result.state,
            error: result.error.clone(),
            engine_version: result.engine_version.clone(),
            frameworks,
            phases: result.phases.clone(),
            total_findings: result.findings.len(),
            vulnerabilities: triaged.findings,
            summary: triaged.summary,
        }
    }
}

/// Writes the report for `format` next to `stem` and returns its path
pub async fn render(
    data: &ReportData,
    stem: &Path,
    format: ReportFormat,
    pdf_converter: &PdfConverter,
) -> Result<PathBuf> {
    match format {
        ReportFormat::Json => {
            let path = report_path(stem, format);
            json::export(data, &path)?;
            Ok(path)
        }
        ReportFormat::Html => {
            let path = report_path(stem, format);
            html::generate(data, &path)?;
            Ok(path)
        }
        ReportFormat::Pdf => pdf::generate(data, stem, pdf_converter).await,
    }
}

/// Filesystem-safe form of a target: scheme dropped, 50 chars at most
pub fn sanitize_target(target: &str) -> String {
    let mut safe = target.trim().to_string();
    if let Ok(re) = Regex::new(r"^https?://") {
        safe = re.replace(&safe, "").into_owned();
    }
    if let Ok(re) = Regex::new(r"[^a-zA-Z0-9.]") {
        safe = re.replace_all(&safe, "_").into_owned();
    }
    safe.chars().take(50).collect()
}

/// `stem` plus the format's extension.
///
/// Stems contain dots from hostnames, so `Path::with_extension` would cut them.
pub fn report_path(stem: &Path, format: ReportFormat) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

/// Output path without extension for a scan of `target` started at `at`
pub fn output_stem(dir: &Path, target: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "security_scan_{}_{}",
        sanitize_target(target),
        at.format("%Y%m%d_%H%M%S")
    ))
}
