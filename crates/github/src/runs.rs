use anyhow::Result;
use gtest_scout_core::models::{
    ArtifactSummary, PlatformReports, RepositoryTarget, RunSummary, has_all_platforms,
};

use crate::{ActionsSource, ApiRun, artifacts::resolve_run_artifacts};

/// Choose the run that represents a commit's build: build-like runs first
/// (or all runs if none look like builds), preferring a successful one.
pub fn pick_build_run(runs: &[ApiRun]) -> Option<&ApiRun> {
    let build_like = runs.iter().filter(|run| run.is_build()).collect::<Vec<_>>();
    let candidates = if build_like.is_empty() { runs.iter().collect() } else { build_like };
    candidates.iter().find(|run| run.is_success()).or(candidates.first()).copied()
}

/// The first build-like run regardless of outcome, else the first run.
pub fn first_build_run(runs: &[ApiRun]) -> Option<&ApiRun> {
    runs.iter().find(|run| run.is_build()).or(runs.first())
}

/// CI state of one commit.
#[derive(Debug, Clone, Default)]
pub struct CommitActions {
    pub runs: Vec<RunSummary>,
    pub selected_build_run: Option<RunSummary>,
    pub artifacts: Vec<ArtifactSummary>,
    pub reports: PlatformReports,
}

impl CommitActions {
    pub fn has_all_platforms(&self) -> bool { has_all_platforms(&self.reports) }
}

pub async fn fetch_actions_for_commit<S: ActionsSource>(
    source: &S,
    repo: &RepositoryTarget,
    sha: &str,
) -> Result<CommitActions> {
    let runs = source.list_runs(repo, sha).await?;
    let summaries = runs.iter().map(ApiRun::summarize).collect::<Vec<_>>();
    let Some(build_run) = pick_build_run(&runs) else {
        tracing::debug!("No workflow runs for {}@{}", repo, sha);
        return Ok(CommitActions { runs: summaries, ..Default::default() });
    };
    tracing::debug!(
        "Commit {} (runs {}, build run {} {:?})",
        sha,
        runs.len(),
        build_run.id,
        build_run.name.as_deref().unwrap_or_default()
    );
    let resolved = resolve_run_artifacts(source, repo, build_run.id).await?;
    Ok(CommitActions {
        runs: summaries,
        selected_build_run: Some(build_run.summarize()),
        artifacts: resolved.artifacts,
        reports: resolved.reports,
    })
}
