use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{ALL_PLATFORMS, Platform, PlatformReports};

pub fn snapshot_path(dir: &Path, platform: Platform, sha: &str) -> PathBuf {
    dir.join(format!("test-results-{}-{}.json", platform.runner(), sha))
}

/// Load previously saved reports for every platform of one commit.
pub fn load_snapshots(dir: &Path, sha: &str) -> Result<PlatformReports> {
    let mut reports = PlatformReports::new();
    for &platform in ALL_PLATFORMS {
        let path = snapshot_path(dir, platform, sha);
        let data = std::fs::read(&path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let report: Value = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        reports.insert(platform, report);
    }
    tracing::info!("Loaded {} snapshots for {} from {}", reports.len(), sha, dir.display());
    Ok(reports)
}
