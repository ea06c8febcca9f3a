//! Scan engine abstraction and the OWASP ZAP API client

pub mod zap;

pub use zap::ZapClient;

use crate::error::Result;
use crate::models::RawAlert;
use async_trait::async_trait;
use std::fmt;

/// Best-effort tuning knobs applied before discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSetting {
    SpiderMaxDepth(u32),
    SpiderThreadCount(u32),
    ActiveScanThreadsPerHost(u32),
    ActiveScanDelayMs(u32),
}

impl fmt::Display for EngineSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSetting::SpiderMaxDepth(v) => write!(f, "spider max depth = {v}"),
            EngineSetting::SpiderThreadCount(v) => write!(f, "spider threads = {v}"),
            EngineSetting::ActiveScanThreadsPerHost(v) => {
                write!(f, "active scan threads per host = {v}")
            }
            EngineSetting::ActiveScanDelayMs(v) => write!(f, "active scan delay = {v}ms"),
        }
    }
}

/// Operations the phase controller needs from a scan engine.
///
/// Phase identifiers are scoped to the engine's own bookkeeping, so one
/// engine instance must not serve two runs at the same time.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Engine version string, used as the capability check
    async fn version(&self) -> Result<String>;

    async fn apply_setting(&self, setting: EngineSetting) -> Result<()>;

    /// Starts the spider and returns its id
    async fn start_discovery(&self, target: &str) -> Result<String>;

    /// Spider progress in percent
    async fn discovery_progress(&self, id: &str) -> Result<u8>;

    async fn stop_discovery(&self, id: &str) -> Result<()>;

    /// Starts the active scanner and returns its id
    async fn start_active_scan(&self, target: &str) -> Result<String>;

    /// Active scan progress in percent
    async fn active_scan_progress(&self, id: &str) -> Result<u8>;

    async fn stop_active_scan(&self, id: &str) -> Result<()>;

    /// All alerts recorded for URLs under `base_url`
    async fn alerts(&self, base_url: &str) -> Result<Vec<RawAlert>>;

    /// Number of API calls made so far
    fn request_count(&self) -> u64 {
        0
    }
}
