//! Scan engine session negotiation across authentication strategies

use crate::engine::{ScanEngine, ZapClient};
use crate::error::{Result, WardenError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// One way of authenticating against the engine API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthStrategy {
    /// Send the configured API key
    ApiKey { key: String },
    /// Send no credential
    Anonymous,
}

impl AuthStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            AuthStrategy::ApiKey { .. } => "with API key",
            AuthStrategy::Anonymous => "without API key",
        }
    }

    /// Strategy order for an optional key: keyed first, anonymous as fallback
    pub fn ordered(api_key: Option<&str>) -> Vec<Self> {
        let mut strategies = Vec::with_capacity(2);
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            strategies.push(AuthStrategy::ApiKey {
                key: key.to_string(),
            });
        }
        strategies.push(AuthStrategy::Anonymous);
        strategies
    }
}

// Keeps keys out of logs
impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::ApiKey { .. } => f.write_str("ApiKey { key: \"***\" }"),
            AuthStrategy::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Builds an engine handle for one strategy
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, strategy: &AuthStrategy) -> Result<Box<dyn ScanEngine>>;
}

/// Connects to a ZAP API endpoint
#[derive(Debug, Clone)]
pub struct ZapConnector {
    endpoint: Url,
    timeout: Duration,
}

impl ZapConnector {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

#[async_trait]
impl Connector for ZapConnector {
    async fn connect(&self, strategy: &AuthStrategy) -> Result<Box<dyn ScanEngine>> {
        let api_key = match strategy {
            AuthStrategy::ApiKey { key } => Some(key.clone()),
            AuthStrategy::Anonymous => None,
        };
        let client = ZapClient::new(&self.endpoint, api_key, self.timeout)?;
        Ok(Box::new(client))
    }
}

/// A verified, usable engine connection for one scan run
pub struct Session {
    engine: Box<dyn ScanEngine>,
    strategy: AuthStrategy,
    version: String,
}

impl Session {
    pub fn engine(&self) -> &dyn ScanEngine {
        self.engine.as_ref()
    }

    pub fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }

    /// Engine version reported by the capability check
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("strategy", &self.strategy)
            .field("version", &self.version)
            .finish()
    }
}

/// Tries each strategy in order until one passes the version check
pub struct ConnectionNegotiator<C> {
    connector: C,
    strategies: Vec<AuthStrategy>,
}

impl<C: Connector> ConnectionNegotiator<C> {
    pub fn new(connector: C, strategies: Vec<AuthStrategy>) -> Self {
        Self {
            connector,
            strategies,
        }
    }

    /// Returns the first working session.
    ///
    /// On total failure the error carries the last attempt's reason only.
    pub async fn negotiate(&self) -> Result<Session> {
        let total = self.strategies.len();
        let mut last_error: Option<WardenError> = None;

        for (idx, strategy) in self.strategies.iter().enumerate() {
            let attempt = idx + 1;
            match self.attempt(strategy).await {
                Ok(session) => {
                    info!(
                        "[engine] connected {} (attempt {attempt}/{total}), version {}",
                        strategy.label(),
                        session.version
                    );
                    return Ok(session);
                }
                Err(e) => {
                    warn!(
                        "[engine] connection {} failed (attempt {attempt}/{total}): {e}",
                        strategy.label()
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(WardenError::NegotiationFailed {
            attempts: total,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no authentication strategies configured".to_string()),
        })
    }

    async fn attempt(&self, strategy: &AuthStrategy) -> Result<Session> {
        let engine = self.connector.connect(strategy).await?;
        let version = engine.version().await?;
        Ok(Session {
            engine,
            strategy: strategy.clone(),
            version,
        })
    }
}
