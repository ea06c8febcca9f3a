//! Common test utilities: a scripted scan engine and its connector

#![allow(dead_code)]

use async_trait::async_trait;
use scanwarden::engine::{EngineSetting, ScanEngine};
use scanwarden::error::{Result, WardenError};
use scanwarden::models::RawAlert;
use scanwarden::orchestrator::{
    AuthStrategy, ConnectionNegotiator, Connector, PhaseConfig, PollPolicy, ScanPhaseController,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DISCOVERY_ID: &str = "7";
pub const ACTIVE_ID: &str = "12";
pub const ENGINE_VERSION: &str = "2.14.0";

/// What the fake engine reports, sample by sample.
///
/// Progress sequences repeat their last value once exhausted.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub discovery: Vec<u8>,
    pub active: Vec<u8>,
    pub alerts: Vec<RawAlert>,
    pub fail_settings: bool,
    pub fail_discovery_start: bool,
    pub fail_discovery_status: bool,
    /// Successful discovery status checks before every later one fails
    pub discovery_fail_after: Option<usize>,
    /// Successful active scan status checks before every later one fails
    pub active_fail_after: Option<usize>,
    pub fail_active_start: bool,
    pub fail_alerts: bool,
}

impl Script {
    pub fn completing(alerts: Vec<RawAlert>) -> Self {
        Self {
            discovery: vec![40, 100],
            active: vec![30, 100],
            alerts,
            ..Self::default()
        }
    }
}

/// Calls observed by the fake engine
#[derive(Debug, Default)]
pub struct Calls {
    pub settings: Vec<EngineSetting>,
    pub discovery_samples: usize,
    pub active_samples: usize,
    pub stopped_discovery: Vec<String>,
    pub stopped_active: Vec<String>,
    pub strategies: Vec<AuthStrategy>,
}

fn refused(what: &str) -> WardenError {
    WardenError::EngineApi {
        status: 500,
        message: format!("{what} refused"),
    }
}

fn nth(sequence: &[u8], idx: usize) -> u8 {
    sequence
        .get(idx)
        .or_else(|| sequence.last())
        .copied()
        .unwrap_or(0)
}

pub struct ScriptedEngine {
    script: Script,
    calls: Arc<Mutex<Calls>>,
    reject_version: bool,
}

#[async_trait]
impl ScanEngine for ScriptedEngine {
    async fn version(&self) -> Result<String> {
        if self.reject_version {
            return Err(WardenError::EngineApi {
                status: 403,
                message: "bad_api_key".to_string(),
            });
        }
        Ok(ENGINE_VERSION.to_string())
    }

    async fn apply_setting(&self, setting: EngineSetting) -> Result<()> {
        self.calls.lock().unwrap().settings.push(setting);
        if self.script.fail_settings {
            return Err(refused("setting"));
        }
        Ok(())
    }

    async fn start_discovery(&self, _target: &str) -> Result<String> {
        if self.script.fail_discovery_start {
            return Err(refused("spider"));
        }
        Ok(DISCOVERY_ID.to_string())
    }

    async fn discovery_progress(&self, id: &str) -> Result<u8> {
        assert_eq!(id, DISCOVERY_ID);
        if self.script.fail_discovery_status {
            return Err(WardenError::InvalidProgress("does_not_exist".to_string()));
        }
        let mut calls = self.calls.lock().unwrap();
        if self.script.discovery_fail_after == Some(calls.discovery_samples) {
            return Err(refused("spider status"));
        }
        let progress = nth(&self.script.discovery, calls.discovery_samples);
        calls.discovery_samples += 1;
        Ok(progress)
    }

    async fn stop_discovery(&self, id: &str) -> Result<()> {
        self.calls.lock().unwrap().stopped_discovery.push(id.to_string());
        Ok(())
    }

    async fn start_active_scan(&self, _target: &str) -> Result<String> {
        if self.script.fail_active_start {
            return Err(refused("active scan"));
        }
        Ok(ACTIVE_ID.to_string())
    }

    async fn active_scan_progress(&self, id: &str) -> Result<u8> {
        assert_eq!(id, ACTIVE_ID);
        let mut calls = self.calls.lock().unwrap();
        if self.script.active_fail_after == Some(calls.active_samples) {
            return Err(refused("active scan status"));
        }
        let progress = nth(&self.script.active, calls.active_samples);
        calls.active_samples += 1;
        Ok(progress)
    }

    async fn stop_active_scan(&self, id: &str) -> Result<()> {
        self.calls.lock().unwrap().stopped_active.push(id.to_string());
        Ok(())
    }

    async fn alerts(&self, _base_url: &str) -> Result<Vec<RawAlert>> {
        if self.script.fail_alerts {
            return Err(refused("alerts"));
        }
        Ok(self.script.alerts.clone())
    }

    fn request_count(&self) -> u64 {
        let calls = self.calls.lock().unwrap();
        (calls.discovery_samples + calls.active_samples) as u64
    }
}

/// Hands out scripted engines; optionally rejects keyed or all sessions
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    pub script: Script,
    pub calls: Arc<Mutex<Calls>>,
    pub reject_keyed: bool,
    pub unreachable: bool,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, strategy: &AuthStrategy) -> Result<Box<dyn ScanEngine>> {
        self.calls.lock().unwrap().strategies.push(strategy.clone());
        if self.unreachable {
            return Err(WardenError::EngineApi {
                status: 502,
                message: "connection refused".to_string(),
            });
        }
        let reject_version = self.reject_keyed && matches!(strategy, AuthStrategy::ApiKey { .. });
        Ok(Box::new(ScriptedEngine {
            script: self.script.clone(),
            calls: Arc::clone(&self.calls),
            reject_version,
        }))
    }
}

/// Short phases: 10s samples, discovery stalls after 12, active after 6
pub fn fast_phases() -> PhaseConfig {
    PhaseConfig {
        discovery: PollPolicy::new(Duration::from_secs(10), 12, Duration::from_secs(600)),
        passive_settle: Duration::from_secs(10),
        active: PollPolicy::new(Duration::from_secs(10), 6, Duration::from_secs(300)),
        ..PhaseConfig::default()
    }
}

pub fn controller(connector: ScriptedConnector) -> ScanPhaseController<ScriptedConnector> {
    controller_with(connector, fast_phases())
}

pub fn controller_with(
    connector: ScriptedConnector,
    config: PhaseConfig,
) -> ScanPhaseController<ScriptedConnector> {
    let negotiator = ConnectionNegotiator::new(connector, AuthStrategy::ordered(Some("k3y")));
    ScanPhaseController::new(negotiator, config)
}

pub fn alert(name: &str, risk: &str) -> RawAlert {
    RawAlert {
        name: Some(name.to_string()),
        risk: Some(risk.to_string()),
        description: Some(format!("{name} description")),
        solution: Some(format!("Fix {name}")),
        url: Some("http://target.test/".to_string()),
        ..RawAlert::default()
    }
}

/// `count` alerts of one risk level
pub fn alerts(prefix: &str, risk: &str, count: usize) -> Vec<RawAlert> {
    (0..count)
        .map(|i| alert(&format!("{prefix} {i}"), risk))
        .collect()
}
