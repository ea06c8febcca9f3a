//! OWASP ZAP JSON API client with request tracking

use crate::engine::{EngineSetting, ScanEngine};
use crate::error::{Result, WardenError};
use crate::models::RawAlert;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header carrying the API key on every call
pub const API_KEY_HEADER: &str = "X-ZAP-API-Key";

/// Alerts requested per page
pub const ALERT_PAGE_SIZE: usize = 500;

#[derive(Deserialize)]
struct VersionView {
    version: String,
}

#[derive(Deserialize)]
struct ScanStarted {
    scan: String,
}

#[derive(Deserialize)]
struct StatusView {
    status: String,
}

#[derive(Deserialize)]
struct AlertsView {
    #[serde(default)]
    alerts: Vec<RawAlert>,
}

#[derive(Deserialize)]
struct ActionResult {
    #[serde(rename = "Result")]
    #[allow(dead_code)]
    result: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

/// ZAP API client bound to one endpoint and credential
#[derive(Clone)]
pub struct ZapClient {
    client: Client,
    base: Url,
    api_key: Option<String>,
    request_count: Arc<AtomicU64>,
}

impl ZapClient {
    /// Creates a client for the API at `endpoint`
    pub fn new(endpoint: &Url, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Scanwarden/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // API paths are joined relative to the endpoint, keeping any prefix
        let mut base = endpoint.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            base,
            api_key,
            request_count: Arc::new(AtomicU64::new(0)),
        })
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.base.join(path)?;
        let mut req = self.client.get(url).query(params);
        if let Some(ref key) = self.api_key {
            req = req.header(API_KEY_HEADER, key.as_str());
        }

        self.request_count.fetch_add(1, Ordering::Relaxed);
        let response = req.send().await?;
        let status = response.status();
        debug!("Engine API {path}: {status}");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(response.json::<T>().await?)
    }

    async fn set_integer_option(&self, path: &str, value: u32) -> Result<()> {
        let _: ActionResult = self.call(path, &[("Integer", value.to_string())]).await?;
        Ok(())
    }
}

fn api_error(status: u16, body: &str) -> WardenError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => match err.message {
            Some(msg) if !msg.is_empty() => format!("{} ({msg})", err.code),
            _ => err.code,
        },
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().chars().take(200).collect(),
    };
    WardenError::EngineApi { status, message }
}

/// Parses a status string, clamping values above 100
pub fn parse_progress(raw: &str) -> Result<u8> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| WardenError::InvalidProgress(raw.to_string()))?;
    if value < 0 {
        return Err(WardenError::InvalidProgress(raw.to_string()));
    }
    Ok(value.min(100) as u8)
}

#[async_trait]
impl ScanEngine for ZapClient {
    async fn version(&self) -> Result<String> {
        let view: VersionView = self.call("JSON/core/view/version/", &[]).await?;
        Ok(view.version)
    }

    async fn apply_setting(&self, setting: EngineSetting) -> Result<()> {
        match setting {
            EngineSetting::SpiderMaxDepth(v) => {
                self.set_integer_option("JSON/spider/action/setOptionMaxDepth/", v)
                    .await
            }
            EngineSetting::SpiderThreadCount(v) => {
                self.set_integer_option("JSON/spider/action/setOptionThreadCount/", v)
                    .await
            }
            EngineSetting::ActiveScanThreadsPerHost(v) => {
                self.set_integer_option("JSON/ascan/action/setOptionThreadPerHost/", v)
                    .await
            }
            EngineSetting::ActiveScanDelayMs(v) => {
                self.set_integer_option("JSON/ascan/action/setOptionDelayInMs/", v)
                    .await
            }
        }
    }

    async fn start_discovery(&self, target: &str) -> Result<String> {
        let started: ScanStarted = self
            .call("JSON/spider/action/scan/", &[("url", target.to_string())])
            .await?;
        Ok(started.scan)
    }

    async fn discovery_progress(&self, id: &str) -> Result<u8> {
        let view: StatusView = self
            .call("JSON/spider/view/status/", &[("scanId", id.to_string())])
            .await?;
        parse_progress(&view.status)
    }

    async fn stop_discovery(&self, id: &str) -> Result<()> {
        let _: ActionResult = self
            .call("JSON/spider/action/stop/", &[("scanId", id.to_string())])
            .await?;
        Ok(())
    }

    async fn start_active_scan(&self, target: &str) -> Result<String> {
        let started: ScanStarted = self
            .call("JSON/ascan/action/scan/", &[("url", target.to_string())])
            .await?;
        Ok(started.scan)
    }

    async fn active_scan_progress(&self, id: &str) -> Result<u8> {
        let view: StatusView = self
            .call("JSON/ascan/view/status/", &[("scanId", id.to_string())])
            .await?;
        parse_progress(&view.status)
    }

    async fn stop_active_scan(&self, id: &str) -> Result<()> {
        let _: ActionResult = self
            .call("JSON/ascan/action/stop/", &[("scanId", id.to_string())])
            .await?;
        Ok(())
    }

    async fn alerts(&self, base_url: &str) -> Result<Vec<RawAlert>> {
        let mut alerts = Vec::new();
        loop {
            let page: AlertsView = self
                .call(
                    "JSON/core/view/alerts/",
                    &[
                        ("baseurl", base_url.to_string()),
                        ("start", alerts.len().to_string()),
                        ("count", ALERT_PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            let fetched = page.alerts.len();
            alerts.extend(page.alerts);
            if fetched < ALERT_PAGE_SIZE {
                break;
            }
        }
        debug!("Fetched {} alerts for {base_url}", alerts.len());
        Ok(alerts)
    }

    fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("0").unwrap(), 0);
        assert_eq!(parse_progress(" 45 ").unwrap(), 45);
        assert_eq!(parse_progress("100").unwrap(), 100);
        assert_eq!(parse_progress("140").unwrap(), 100);
        assert!(parse_progress("-1").is_err());
        assert!(parse_progress("does_not_exist").is_err());
    }

    #[test]
    fn test_endpoint_prefix_is_kept() {
        let endpoint = Url::parse("http://zap.internal:8090/zap").unwrap();
        let client = ZapClient::new(&endpoint, None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.base.join("JSON/core/view/version/").unwrap().as_str(),
            "http://zap.internal:8090/zap/JSON/core/view/version/"
        );
    }

    #[test]
    fn test_api_error_uses_engine_code() {
        let err = api_error(400, r#"{"code":"bad_api_key","message":"Invalid key"}"#);
        assert_eq!(err.to_string(), "Scan engine returned 400: bad_api_key (Invalid key)");

        let err = api_error(502, "");
        assert_eq!(err.to_string(), "Scan engine returned 502: empty response");
    }
}
