use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use futures_util::{StreamExt, TryStreamExt, stream};
use gtest_scout_core::{
    models::{ArtifactSummary, Platform, PlatformReports, RepositoryTarget},
    report::is_gtest_report,
};
use serde_json::Value;

use crate::{ActionsSource, ApiArtifact};

/// Artifact downloads kept in flight at once. Results are still folded in
/// listing order.
const DOWNLOAD_CONCURRENCY: usize = 3;

/// A gtest report found inside an artifact archive.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub file_name: String,
    pub report: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedArtifacts {
    pub artifacts: Vec<ArtifactSummary>,
    pub reports: PlatformReports,
}

/// Extract every gtest report from a zip archive, in entry order.
/// Entries that aren't UTF-8 gtest JSON are skipped.
pub fn read_archive_reports(data: &[u8]) -> Result<Vec<ReportFile>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut reports = Vec::new();
    for i in 0..archive.len() {
        let mut file = match archive.by_index(i) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Failed to read archive entry {}: {}", i, e);
                continue;
            }
        };
        if file.is_dir() || !file.name().to_lowercase().ends_with(".json") {
            continue;
        }
        let file_name = file.name().to_string();
        let mut contents = String::new();
        if let Err(e) = file.read_to_string(&mut contents) {
            tracing::debug!("Skipping {}: {}", file_name, e);
            continue;
        }
        let report = match serde_json::from_str::<Value>(&contents) {
            Ok(report) if is_gtest_report(&report) => report,
            Ok(_) => {
                tracing::debug!("Skipping {}: not a gtest report", file_name);
                continue;
            }
            Err(e) => {
                tracing::debug!("Skipping {}: {}", file_name, e);
                continue;
            }
        };
        reports.push(ReportFile { file_name, report });
    }
    Ok(reports)
}

/// Store an artifact's reports by platform. The artifact name decides the
/// platform when it names one, otherwise each file name does.
pub fn collect_platform_reports(
    reports: &mut PlatformReports,
    artifact_name: &str,
    files: Vec<ReportFile>,
) {
    let artifact_platform = Platform::detect(artifact_name);
    for file in files {
        let Some(platform) = artifact_platform.or_else(|| Platform::detect(&file.file_name)) else {
            tracing::debug!("No platform for {} in artifact {}", file.file_name, artifact_name);
            continue;
        };
        if reports.insert(platform, file.report).is_some() {
            tracing::debug!("Replacing {} report with {} from {}", platform, file.file_name, artifact_name);
        }
    }
}

async fn fetch_artifact_reports<S: ActionsSource>(
    source: &S,
    repo: &RepositoryTarget,
    artifact: &ApiArtifact,
) -> Result<Vec<ReportFile>> {
    if artifact.expired {
        tracing::debug!("Skipping expired artifact {} ({})", artifact.name, artifact.id);
        return Ok(vec![]);
    }
    let data = source.download_artifact(repo, artifact.id).await?;
    match read_archive_reports(&data) {
        Ok(files) => Ok(files),
        Err(e) => {
            tracing::warn!("Failed to read artifact {} ({}): {:?}", artifact.name, artifact.id, e);
            Ok(vec![])
        }
    }
}

/// Download the given artifacts of a run and collect their platform reports.
pub async fn resolve_artifacts<S: ActionsSource>(
    source: &S,
    repo: &RepositoryTarget,
    run_id: u64,
    artifacts: &[ApiArtifact],
) -> Result<ResolvedArtifacts> {
    let downloads: Vec<Vec<ReportFile>> = stream::iter(artifacts)
        .map(|artifact| fetch_artifact_reports(source, repo, artifact))
        .buffered(DOWNLOAD_CONCURRENCY)
        .try_collect()
        .await
        .with_context(|| format!("Failed to resolve artifacts of run {run_id}"))?;
    let mut reports = PlatformReports::new();
    for (artifact, files) in artifacts.iter().zip(downloads) {
        if files.is_empty() {
            tracing::debug!("No report found in workflow run {} artifact {}", run_id, artifact.name);
        }
        collect_platform_reports(&mut reports, &artifact.name, files);
    }
    tracing::debug!(
        "Run {} (artifacts {}, platforms {})",
        run_id,
        artifacts.len(),
        reports.keys().map(|p| p.name()).collect::<Vec<_>>().join(", ")
    );
    Ok(ResolvedArtifacts { artifacts: artifacts.iter().map(ApiArtifact::summarize).collect(), reports })
}

/// List a run's artifacts and collect their platform reports.
pub async fn resolve_run_artifacts<S: ActionsSource>(
    source: &S,
    repo: &RepositoryTarget,
    run_id: u64,
) -> Result<ResolvedArtifacts> {
    let artifacts = source.list_artifacts(repo, run_id).await?;
    resolve_artifacts(source, repo, run_id, &artifacts).await
}
