//! Technology fingerprinting through WhatWeb
//!
//! Runs independently of the scan engine; a failure here only means the
//! report has no technology section.

use crate::config::FingerprintConfig;
use crate::error::{Result, WardenError};
use crate::orchestrator::CancelSignal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const LANGUAGE_HINTS: &[&str] = &["php", "python", "ruby", "java", "asp", "node"];
const CMS_HINTS: &[&str] = &["wordpress", "joomla", "drupal"];
const SERVER_HINTS: &[&str] = &["apache", "nginx", "iis"];
const FRAMEWORK_HINTS: &[&str] = &["rails", "django", "laravel", "spring"];

/// One detected technology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,
    pub confidence: u64,
    pub version: String,
    pub categories: Vec<String>,
}

/// Everything detected for a target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub technologies: Vec<Technology>,
    pub server: Option<String>,
    pub framework: Option<String>,
    pub cms: Option<String>,
    pub languages: Vec<String>,
}

/// Wraps the external fingerprinting tool
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    program: String,
    timeout: Duration,
}

impl Fingerprinter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &FingerprintConfig) -> Self {
        Self::new(config.program.clone(), config.timeout)
    }

    /// Runs the tool once against `target`
    pub async fn fingerprint(&self, target: &str) -> Result<Fingerprint> {
        info!("[fingerprint] running {} against {target}", self.program);
        let child = Command::new(&self.program)
            .arg("--log-json=-")
            .arg(target)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(WardenError::Fingerprint(format!(
                    "could not run {}: {e}",
                    self.program
                )))
            }
            Err(_) => {
                warn!(
                    "[fingerprint] {} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                );
                return Err(WardenError::Fingerprint(
                    "fingerprinting timed out".to_string(),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(WardenError::Fingerprint(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            }));
        }

        let fingerprint = parse_output(&String::from_utf8_lossy(&output.stdout))?;
        info!(
            "[fingerprint] detected {} technologies",
            fingerprint.technologies.len()
        );
        Ok(fingerprint)
    }

    /// Runs the tool unless `cancel` fires first; the tool is killed then
    pub async fn fingerprint_until(&self, target: &str, cancel: &CancelSignal) -> Result<Fingerprint> {
        tokio::select! {
            result = self.fingerprint(target) => result,
            _ = cancel.cancelled() => {
                warn!("[fingerprint] cancelled, stopping {}", self.program);
                Err(WardenError::Fingerprint("fingerprinting cancelled".to_string()))
            }
        }
    }
}

/// Parses WhatWeb JSON log output, either an array or one object per line
pub fn parse_output(output: &str) -> Result<Fingerprint> {
    let trimmed = output.trim();
    let entries: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .map_err(|e| WardenError::Fingerprint(format!("failed to parse output: {e}")))?
    } else {
        trimmed
            .lines()
            .map(|line| line.trim().trim_end_matches(','))
            .filter(|line| !line.is_empty() && *line != "[" && *line != "]")
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| WardenError::Fingerprint(format!("failed to parse output: {e}")))?
    };

    let mut fingerprint = Fingerprint::default();
    for entry in &entries {
        let Some(plugins) = entry.get("plugins").and_then(Value::as_object) else {
            debug!("[fingerprint] entry without plugins skipped");
            continue;
        };
        for (name, data) in plugins {
            if name.eq_ignore_ascii_case("title") {
                continue;
            }
            fingerprint.technologies.push(Technology {
                name: name.clone(),
                confidence: data
                    .get("confidence")
                    .or_else(|| data.get("certainty"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                version: join_strings(data.get("version")),
                categories: string_list(data.get("categories")),
            });
            classify(&mut fingerprint, name);
        }
    }
    Ok(fingerprint)
}

fn classify(fingerprint: &mut Fingerprint, name: &str) {
    let lower = name.to_lowercase();
    let matches = |hints: &[&str]| hints.iter().any(|h| lower.contains(h));

    if matches(LANGUAGE_HINTS) {
        fingerprint.languages.push(name.to_string());
    } else if matches(CMS_HINTS) {
        fingerprint.cms = Some(name.to_string());
    } else if matches(SERVER_HINTS) {
        fingerprint.server = Some(name.to_string());
    } else if matches(FRAMEWORK_HINTS) {
        fingerprint.framework = Some(name.to_string());
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn join_strings(value: Option<&Value>) -> String {
    string_list(value).join(", ")
}
