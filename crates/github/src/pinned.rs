use std::path::Path;

use anyhow::Result;
use gtest_scout_core::{
    ScanError,
    config::PinnedConfig,
    models::{PlatformReports, RepositoryTarget},
    snapshot::load_snapshots,
    summary::{
        ActionsMetadata, ReportDocument, SelectedCommit, SourceInfo, SourceMode, Totals,
        aggregate_with,
    },
    util::format_timestamp,
};
use time::OffsetDateTime;

use crate::{ActionsSource, ApiCommit, ApiRun, artifacts::resolve_artifacts, runs::first_build_run};

/// Reports and CI state of a single known commit.
#[derive(Debug, Clone)]
pub struct PinnedCommit {
    pub commit: ApiCommit,
    pub actions: ActionsMetadata,
    pub reports: PlatformReports,
}

pub async fn fetch_pinned_commit<S: ActionsSource>(
    source: &S,
    repo: &RepositoryTarget,
    sha: &str,
) -> Result<PinnedCommit> {
    let commits = source.list_commits(repo).await?;
    let Some(commit) = commits.into_iter().find(|c| c.sha == sha) else {
        return Err(ScanError::CommitNotFound { repository: repo.key(), sha: sha.to_string() }.into());
    };
    let runs = source.list_runs(repo, sha).await?;
    let Some(build_run) = first_build_run(&runs) else {
        return Err(ScanError::NoRuns(sha.to_string()).into());
    };
    let artifacts = source.list_artifacts(repo, build_run.id).await?;
    if artifacts.is_empty() {
        return Err(ScanError::NoArtifacts(build_run.id).into());
    }
    let resolved = resolve_artifacts(source, repo, build_run.id, &artifacts).await?;
    tracing::info!(
        "Fetched {} platform reports for {}@{} from run {}",
        resolved.reports.len(),
        repo,
        sha,
        build_run.id
    );
    Ok(PinnedCommit {
        actions: ActionsMetadata {
            runs: Some(runs.iter().map(ApiRun::summarize).collect()),
            selected_build_run: Some(build_run.summarize()),
            artifacts: resolved.artifacts,
            ..Default::default()
        },
        commit,
        reports: resolved.reports,
    })
}

/// Build the report document for one commit. When `snapshots` is set, a
/// failed fetch falls back to the saved reports in that directory. Summaries
/// use the totals each report states.
pub async fn pinned_document<S: ActionsSource>(
    source: &S,
    pinned: &PinnedConfig,
    snapshots: Option<&Path>,
    fetched_at: OffsetDateTime,
) -> Result<ReportDocument> {
    let repo = &pinned.repository;
    let (mode, commit, actions, reports) = match fetch_pinned_commit(source, repo, &pinned.sha).await {
        Ok(fetched) => {
            let commit = SelectedCommit { repository: repo.key(), commit: fetched.commit.summarize() };
            (SourceMode::GithubArtifacts, Some(commit), Some(fetched.actions), fetched.reports)
        }
        Err(e) => {
            let Some(dir) = snapshots else {
                return Err(e);
            };
            tracing::warn!("GitHub artifact fetch failed, using local fallback: {:?}", e);
            (SourceMode::LocalFallback, None, None, load_snapshots(dir, &pinned.sha)?)
        }
    };
    let aggregate = aggregate_with(reports, Totals::ReportHeader)?;
    let source = SourceInfo {
        owner: repo.owner.clone(),
        repo: repo.name.clone(),
        commit_sha: pinned.sha.clone(),
        fallback_run_id: pinned.fallback_run_id,
        base_commit_sha: None,
        max_commit_age_days: None,
        mode,
        repositories: None,
        fetched_at: format_timestamp(fetched_at),
    };
    Ok(ReportDocument::new(source, commit, actions, aggregate))
}
