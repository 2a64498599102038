use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    ScanError,
    models::{
        ArtifactSummary, CommitInfo, CommitScan, PlatformReports, PlatformSummary,
        RepositoryScan, RunSummary, missing_platforms,
    },
    report::{RowFilter, TestRow, extract_rows, summarize_platform, summarize_report_totals},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceMode {
    GithubArtifacts,
    LocalFallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub owner: String,
    pub repo: String,
    pub commit_sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_run_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_commit_age_days: Option<u32>,
    pub mode: SourceMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<String>>,
    pub fetched_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCommit {
    pub repository: String,
    #[serde(flatten)]
    pub commit: CommitInfo,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<RunSummary>>,
    pub selected_build_run: Option<RunSummary>,
    pub artifacts: Vec<ArtifactSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_commit_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commits: Option<Vec<CommitScan>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_repositories: Option<Vec<RepositoryScan>>,
}

/// Authoritative per-platform view of the selected commit's reports.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub summary: Vec<PlatformSummary>,
    pub tests: Vec<TestRow>,
    pub raw: PlatformReports,
}

/// Where the per-platform summary totals come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Totals {
    /// Counted from the extracted test rows.
    Rows,
    /// Read from each report's `tests`, `failures`, `errors` and `time` fields.
    ReportHeader,
}

/// Flatten a complete set of platform reports into summaries and test rows.
pub fn aggregate(reports: PlatformReports) -> Result<Aggregate, ScanError> {
    aggregate_with(reports, Totals::Rows)
}

pub fn aggregate_with(reports: PlatformReports, totals: Totals) -> Result<Aggregate, ScanError> {
    let missing = missing_platforms(&reports);
    if !missing.is_empty() {
        return Err(ScanError::MissingPlatforms(missing));
    }
    let mut summary = Vec::with_capacity(reports.len());
    let mut tests = Vec::new();
    for (&platform, report) in &reports {
        let rows = extract_rows(report, platform, RowFilter::All);
        summary.push(match totals {
            Totals::Rows => summarize_platform(platform, report, &rows),
            Totals::ReportHeader => summarize_report_totals(platform, report),
        });
        tests.extend(rows);
    }
    Ok(Aggregate { summary, tests, raw: reports })
}

/// The document written at the end of an invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub source: SourceInfo,
    pub commit: Option<SelectedCommit>,
    pub actions: Option<ActionsMetadata>,
    pub summary: Vec<PlatformSummary>,
    pub tests: Vec<TestRow>,
    pub raw: PlatformReports,
}

impl ReportDocument {
    pub fn new(
        source: SourceInfo,
        commit: Option<SelectedCommit>,
        actions: Option<ActionsMetadata>,
        aggregate: Aggregate,
    ) -> Self {
        let Aggregate { summary, tests, raw } = aggregate;
        Self { source, commit, actions, summary, tests, raw }
    }

    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        out.push('\n');
        Ok(out)
    }
}
