//! Configuration management for Scanwarden

use crate::error::{Result, WardenError};
use crate::orchestrator::{AuthStrategy, EngineTuning, PhaseConfig, PollPolicy};
use crate::triage::DEFAULT_MAX_FINDINGS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable that overrides `engine.api_key`
pub const API_KEY_ENV: &str = "SCANWARDEN_API_KEY";

/// Shortest accepted passive settle wait
pub const MIN_PASSIVE_SETTLE_SECS: u64 = 10;

/// File-based configuration structure matching default.toml
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    engine: Option<EngineSection>,
    tuning: Option<TuningSection>,
    discovery: Option<PollSection>,
    passive: Option<PassiveSection>,
    active: Option<PollSection>,
    report: Option<ReportSection>,
    fingerprint: Option<FingerprintSection>,
    storage: Option<StorageSection>,
    run: Option<RunSection>,
}

#[derive(Debug, Deserialize)]
struct EngineSection {
    endpoint: Option<String>,
    api_key: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TuningSection {
    max_depth: Option<u32>,
    thread_count: Option<u32>,
    delay_ms: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PollSection {
    interval_secs: Option<u64>,
    stagnation_threshold: Option<u32>,
    budget_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PassiveSection {
    settle_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReportSection {
    max_findings: Option<usize>,
    output_dir: Option<String>,
    pdf_converter: Option<String>,
    convert_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FingerprintSection {
    program: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunSection {
    deadline_secs: Option<u64>,
}

/// Scan engine connection settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

/// Report output settings
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub max_findings: usize,
    pub output_dir: PathBuf,
    pub pdf_converter: String,
    /// Longest a single PDF conversion may run
    pub convert_timeout: Duration,
}

/// Fingerprinting tool settings
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    pub program: String,
    pub timeout: Duration,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub phases: PhaseConfig,
    pub report: ReportConfig,
    pub fingerprint: FingerprintConfig,
    pub storage_dir: PathBuf,
    /// Hard limit for a whole run
    pub run_deadline: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                endpoint: "http://localhost:8080".to_string(),
                api_key: None,
                request_timeout: Duration::from_secs(30),
            },
            phases: PhaseConfig::default(),
            report: ReportConfig {
                max_findings: DEFAULT_MAX_FINDINGS,
                output_dir: PathBuf::from("."),
                pdf_converter: "wkhtmltopdf".to_string(),
                convert_timeout: Duration::from_secs(120),
            },
            fingerprint: FingerprintConfig {
                program: "whatweb".to_string(),
                timeout: Duration::from_secs(300),
            },
            storage_dir: PathBuf::from("scans"),
            run_deadline: None,
        }
    }
}

impl EngineConfig {
    /// Parsed API endpoint
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            WardenError::ConfigError(format!("invalid engine.endpoint '{}': {e}", self.endpoint))
        })
    }
}

impl AppConfig {
    /// Authentication strategies to try, in order
    pub fn auth_strategies(&self) -> Vec<AuthStrategy> {
        AuthStrategy::ordered(self.engine.api_key.as_deref())
    }

    /// Applies `SCANWARDEN_API_KEY` when it is set and non-empty
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.engine.api_key = Some(key.trim().to_string());
            }
        }
    }

    /// Rejects timings that would make polling meaningless
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in [
            ("discovery", &self.phases.discovery),
            ("active", &self.phases.active),
        ] {
            if policy.interval.is_zero() {
                return Err(WardenError::ConfigError(format!(
                    "{name}.interval_secs must be greater than zero"
                )));
            }
            if policy.budget.is_zero() {
                return Err(WardenError::ConfigError(format!(
                    "{name}.budget_secs must be greater than zero"
                )));
            }
            if policy.stagnation_threshold == 0 {
                return Err(WardenError::ConfigError(format!(
                    "{name}.stagnation_threshold must be at least 1"
                )));
            }
        }
        if self.phases.passive_settle < Duration::from_secs(MIN_PASSIVE_SETTLE_SECS) {
            return Err(WardenError::ConfigError(format!(
                "passive.settle_secs must be at least {MIN_PASSIVE_SETTLE_SECS}"
            )));
        }
        self.engine.endpoint_url()?;
        if self.engine.request_timeout.is_zero() {
            return Err(WardenError::ConfigError(
                "engine.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.report.convert_timeout.is_zero() {
            return Err(WardenError::ConfigError(
                "report.convert_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(WardenError::IoError)?;
    parse_config(&content)
}

/// Parses TOML text over the defaults and validates the result
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let file_config: FileConfig = toml::from_str(content)?;
    let mut config = AppConfig::default();

    if let Some(engine) = file_config.engine {
        if let Some(endpoint) = engine.endpoint {
            config.engine.endpoint = endpoint;
        }
        if let Some(key) = engine.api_key {
            config.engine.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(timeout) = engine.request_timeout_secs {
            config.engine.request_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(tuning) = file_config.tuning {
        let defaults = EngineTuning::default();
        config.phases.tuning = EngineTuning {
            max_depth: tuning.max_depth.unwrap_or(defaults.max_depth),
            thread_count: tuning.thread_count.unwrap_or(defaults.thread_count),
            delay_ms: tuning.delay_ms.unwrap_or(defaults.delay_ms),
        };
    }

    if let Some(discovery) = file_config.discovery {
        merge_poll(&mut config.phases.discovery, discovery);
    }
    if let Some(active) = file_config.active {
        merge_poll(&mut config.phases.active, active);
    }
    if let Some(passive) = file_config.passive {
        if let Some(secs) = passive.settle_secs {
            config.phases.passive_settle = Duration::from_secs(secs);
        }
    }

    if let Some(report) = file_config.report {
        if let Some(max) = report.max_findings {
            config.report.max_findings = max;
        }
        if let Some(dir) = report.output_dir {
            config.report.output_dir = PathBuf::from(dir);
        }
        if let Some(converter) = report.pdf_converter {
            config.report.pdf_converter = converter;
        }
        if let Some(timeout) = report.convert_timeout_secs {
            config.report.convert_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(fingerprint) = file_config.fingerprint {
        if let Some(program) = fingerprint.program {
            config.fingerprint.program = program;
        }
        if let Some(timeout) = fingerprint.timeout_secs {
            config.fingerprint.timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(storage) = file_config.storage {
        if let Some(dir) = storage.dir {
            config.storage_dir = PathBuf::from(dir);
        }
    }

    if let Some(run) = file_config.run {
        config.run_deadline = run.deadline_secs.map(Duration::from_secs);
    }

    config.validate()?;
    Ok(config)
}

fn merge_poll(policy: &mut PollPolicy, section: PollSection) {
    if let Some(interval) = section.interval_secs {
        policy.interval = Duration::from_secs(interval);
    }
    if let Some(threshold) = section.stagnation_threshold {
        policy.stagnation_threshold = threshold;
    }
    if let Some(budget) = section.budget_secs {
        policy.budget = Duration::from_secs(budget);
    }
}
