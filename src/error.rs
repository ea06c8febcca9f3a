//! Error types for Scanwarden

use thiserror::Error;

/// Main error type for Scanwarden operations
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Scan engine returned {status}: {message}")]
    EngineApi { status: u16, message: String },

    #[error("Scan engine reported an invalid progress value '{0}'")]
    InvalidProgress(String),

    #[error("Could not establish a scan engine session after {attempts} attempt(s): {reason}")]
    NegotiationFailed { attempts: usize, reason: String },

    #[error("Fingerprinting failed: {0}")]
    Fingerprint(String),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for Scanwarden operations
pub type Result<T> = std::result::Result<T, WardenError>;
