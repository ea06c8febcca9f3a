//! Scan record persistence

use crate::error::{Result, WardenError};
use crate::models::ScanResult;
use crate::report::Frameworks;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// One stored scan: the full, untriaged result plus where its report went
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    pub target: String,
    pub timestamp: DateTime<Local>,
    pub frameworks: Frameworks,
    pub result: ScanResult,
    pub report_path: PathBuf,
}

impl ScanRecord {
    /// Builds a record with a freshly generated id
    pub fn new(result: ScanResult, frameworks: Frameworks, report_path: impl Into<PathBuf>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target: result.target.clone(),
            timestamp: Local::now(),
            frameworks,
            result,
            report_path: report_path.into(),
        }
    }
}

/// Somewhere scan records can be kept
pub trait ScanStore {
    /// Stores `record` and returns its id
    fn store(&self, record: &ScanRecord) -> Result<String>;
}

/// Stores each record as `<dir>/<id>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(WardenError::Storage(format!("invalid record id '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Reads a stored record back
    pub fn load(&self, id: &str) -> Result<ScanRecord> {
        let path = self.record_path(id)?;
        load_record(&path)
    }
}

/// Reads a record from an explicit file path
pub fn load_record(path: &Path) -> Result<ScanRecord> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WardenError::Storage(format!("cannot read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&content)?)
}

impl ScanStore for JsonFileStore {
    fn store(&self, record: &ScanRecord) -> Result<String> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            WardenError::Storage(format!("cannot create {}: {e}", self.dir.display()))
        })?;
        let path = self.record_path(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json)
            .map_err(|e| WardenError::Storage(format!("cannot write {}: {e}", path.display())))?;
        info!("Scan record {} stored at {}", record.id, path.display());
        Ok(record.id.clone())
    }
}
