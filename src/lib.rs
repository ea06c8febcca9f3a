//! Scanwarden - phased web security scan orchestration
//!
//! Drives an OWASP ZAP instance through discovery, passive analysis and
//! active probing, tolerating stalled or unresponsive phases, then turns
//! the raw alerts into a bounded, risk-ordered report.

pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod storage;
pub mod triage;
