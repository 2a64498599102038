use thiserror::Error;

use crate::models::Platform;

/// Fatal conditions of a scan. These travel inside [`anyhow::Error`] and can be
/// recovered with `downcast_ref::<ScanError>()`.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid repository identifier: {0}. Expected owner/repo format.")]
    InvalidRepository(String),
    #[error("Invalid maximum commit age: {0}. Expected a number of days.")]
    InvalidMaxAge(String),
    #[error("Base commit not found for {repository}: {sha}")]
    BaseCommitNotFound { repository: String, sha: String },
    #[error("Commit not found in {repository}: {sha}")]
    CommitNotFound { repository: String, sha: String },
    #[error("No GitHub Actions runs found for commit {0}")]
    NoRuns(String),
    #[error("No artifacts found for build run {0}")]
    NoArtifacts(u64),
    #[error(
        "No usable build artifacts found across repositories ({}) within {max_age_days} days",
        .repositories.join(", ")
    )]
    NoUsableArtifacts { repositories: Vec<String>, max_age_days: u32 },
    #[error("Missing gtest reports for: {}", join_platforms(.0))]
    MissingPlatforms(Vec<Platform>),
}

fn join_platforms(platforms: &[Platform]) -> String {
    platforms.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
}
