pub mod artifacts;
pub mod pinned;
pub mod runs;
pub mod scan;
mod wire;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use bytes::Bytes;
use gtest_scout_core::{config::GitHubConfig, models::RepositoryTarget, util::size};
use octocrab::{Octocrab, models::ArtifactId, params::actions::ArchiveFormat};
pub use wire::{ApiArtifact, ApiArtifactList, ApiCommit, ApiCommitDetail, ApiGitActor, ApiRun, ApiRunList};

use crate::wire::{PageParams, RunParams};

const PER_PAGE: u8 = 100;

/// The GitHub endpoints a scan reads from. Every call is read-only.
#[allow(async_fn_in_trait)]
pub trait ActionsSource {
    /// Full commit history of the default branch, newest first.
    async fn list_commits(&self, repo: &RepositoryTarget) -> Result<Vec<ApiCommit>>;

    /// Workflow runs triggered for a commit.
    async fn list_runs(&self, repo: &RepositoryTarget, sha: &str) -> Result<Vec<ApiRun>>;

    /// Every artifact uploaded by a workflow run, in listing order.
    async fn list_artifacts(&self, repo: &RepositoryTarget, run_id: u64) -> Result<Vec<ApiArtifact>>;

    /// Zip archive of an artifact.
    async fn download_artifact(&self, repo: &RepositoryTarget, artifact_id: u64) -> Result<Bytes>;
}

#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
}

impl GitHub {
    /// Build the client. No request is made until the first call.
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        }
        let client = builder.build().context("Failed to create GitHub client")?;
        if config.token.is_some() {
            tracing::info!("Using configured GitHub token");
        } else {
            tracing::info!("No GitHub token configured, using anonymous access");
        }
        Ok(Self { client })
    }
}

impl ActionsSource for GitHub {
    async fn list_commits(&self, repo: &RepositoryTarget) -> Result<Vec<ApiCommit>> {
        let route = format!("/repos/{}/{}/commits", repo.owner, repo.name);
        let mut commits = Vec::new();
        let mut page = 1u32;
        loop {
            let items: Vec<ApiCommit> = self
                .client
                .get(&route, Some(&PageParams { per_page: Some(PER_PAGE), page: Some(page) }))
                .await
                .with_context(|| format!("Failed to fetch commits page {page} for {repo}"))?;
            let last_page = items.len() < PER_PAGE as usize;
            commits.extend(items);
            if last_page {
                break;
            }
            page += 1;
        }
        tracing::debug!("Fetched {} commits for {}", commits.len(), repo);
        Ok(commits)
    }

    async fn list_runs(&self, repo: &RepositoryTarget, sha: &str) -> Result<Vec<ApiRun>> {
        let response: ApiRunList = self
            .client
            .get(
                format!("/repos/{}/{}/actions/runs", repo.owner, repo.name),
                Some(&RunParams { head_sha: sha, per_page: PER_PAGE }),
            )
            .await
            .with_context(|| format!("Failed to fetch workflow runs for {repo}@{sha}"))?;
        if response.total_count > response.workflow_runs.len() as u64 {
            tracing::debug!(
                "Using the first {} of {} workflow runs for {}@{}",
                response.workflow_runs.len(),
                response.total_count,
                repo,
                sha
            );
        }
        Ok(response.workflow_runs)
    }

    async fn list_artifacts(&self, repo: &RepositoryTarget, run_id: u64) -> Result<Vec<ApiArtifact>> {
        let route = format!("/repos/{}/{}/actions/runs/{}/artifacts", repo.owner, repo.name, run_id);
        let mut page = 1;
        let mut response: ApiArtifactList = self
            .client
            .get(&route, Some(&PageParams { per_page: Some(PER_PAGE), page: Some(page) }))
            .await
            .with_context(|| format!("Failed to fetch artifacts for run {run_id}"))?;
        let mut artifacts = response.artifacts;
        while (artifacts.len() as u64) < response.total_count {
            page += 1;
            response = self
                .client
                .get(&route, Some(&PageParams { per_page: Some(PER_PAGE), page: Some(page) }))
                .await
                .with_context(|| format!("Failed to fetch artifacts page {page} for run {run_id}"))?;
            if response.artifacts.is_empty() {
                break;
            }
            artifacts.extend(response.artifacts);
        }
        Ok(artifacts)
    }

    async fn download_artifact(&self, repo: &RepositoryTarget, artifact_id: u64) -> Result<Bytes> {
        let bytes = self
            .client
            .actions()
            .download_artifact(&repo.owner, &repo.name, ArtifactId(artifact_id), ArchiveFormat::Zip)
            .await
            .with_context(|| format!("Failed to download artifact {artifact_id} from {repo}"))?;
        tracing::debug!("Downloaded artifact {} ({})", artifact_id, size(bytes.len() as u64));
        Ok(bytes)
    }
}
