//! JSON report export

use crate::error::Result;
use crate::report::ReportData;
use std::path::Path;
use tracing::info;

/// Exports report data as a pretty-printed JSON file
pub fn export(data: &ReportData, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(output_path, json)?;
    info!("JSON report saved to {}", output_path.display());
    Ok(())
}

/// Loads report data back from a JSON file
pub fn load(input_path: &Path) -> Result<ReportData> {
    let content = std::fs::read_to_string(input_path)?;
    let data: ReportData = serde_json::from_str(&content)?;
    Ok(data)
}
