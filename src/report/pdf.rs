//! PDF report generation through an external HTML-to-PDF converter

use crate::config::ReportConfig;
use crate::error::{Result, WardenError};
use crate::report::{html, report_path, ReportData, ReportFormat};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Intermediate HTML file, removed when dropped
struct Intermediate {
    path: PathBuf,
}

impl Intermediate {
    fn write(data: &ReportData) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("scanwarden-{}.html", uuid::Uuid::new_v4()));
        html::generate(data, &path)?;
        Ok(Self { path })
    }
}

impl Drop for Intermediate {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not remove {}: {e}", self.path.display());
            }
        }
    }
}

/// External `<program> <input.html> <output.pdf>` converter
#[derive(Debug, Clone)]
pub struct PdfConverter {
    program: String,
    timeout: Duration,
}

impl PdfConverter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.pdf_converter.clone(), config.convert_timeout)
    }
}

/// Generates `<stem>.pdf`, or `<stem>.html` when the converter is not installed
pub async fn generate(data: &ReportData, stem: &Path, converter: &PdfConverter) -> Result<PathBuf> {
    let intermediate = Intermediate::write(data)?;
    let output = report_path(stem, ReportFormat::Pdf);
    let program = converter.program.as_str();

    let child = Command::new(program)
        .arg(&intermediate.path)
        .arg(&output)
        .kill_on_drop(true)
        .output();

    let converted = match tokio::time::timeout(converter.timeout, child).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
            warn!("{program} is not available. Generating HTML report instead.");
            let fallback = report_path(stem, ReportFormat::Html);
            html::generate(data, &fallback)?;
            return Ok(fallback);
        }
        Ok(Err(e)) => {
            return Err(WardenError::Render(format!("could not run {program}: {e}")));
        }
        Err(_) => {
            return Err(WardenError::Render(format!(
                "{program} timed out after {}s",
                converter.timeout.as_secs()
            )));
        }
    };

    if !converted.status.success() {
        let stderr = String::from_utf8_lossy(&converted.stderr).trim().to_string();
        return Err(WardenError::Render(format!(
            "{program} exited with {}: {stderr}",
            converted.status
        )));
    }

    info!("PDF report saved to {}", output.display());
    Ok(output)
}
