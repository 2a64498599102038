//! Response shapes of the GitHub REST endpoints the scanner reads.

use gtest_scout_core::{
    models::{ArtifactSummary, CommitInfo, RunSummary},
    util::parse_timestamp,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommit {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub commit: ApiCommitDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCommitDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<ApiGitActor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiGitActor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl ApiCommit {
    pub fn author_date(&self) -> Option<&str> {
        self.commit.author.as_ref().and_then(|a| a.date.as_deref())
    }

    /// Author timestamp, if present and parseable.
    pub fn timestamp(&self) -> Option<OffsetDateTime> { self.author_date().and_then(parse_timestamp) }

    pub fn summarize(&self) -> CommitInfo {
        CommitInfo {
            sha: self.sha.clone(),
            message: self.commit.message.clone(),
            author_name: self.commit.author.as_ref().and_then(|a| a.name.clone()),
            author_date: self.author_date().map(str::to_string),
            html_url: self.html_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub run_number: Option<u64>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: String,
}

impl ApiRun {
    /// Whether the run's name or display title mentions a build.
    pub fn is_build(&self) -> bool {
        [&self.name, &self.display_title]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains("build"))
    }

    pub fn is_success(&self) -> bool { self.conclusion.as_deref() == Some("success") }

    pub fn summarize(&self) -> RunSummary {
        RunSummary {
            id: self.id,
            name: self.name.clone(),
            workflow_name: self.display_title.clone(),
            event: self.event.clone(),
            status: self.status.clone(),
            conclusion: self.conclusion.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            html_url: self.html_url.clone(),
            run_number: self.run_number,
            head_branch: self.head_branch.clone(),
            head_sha: self.head_sha.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<ApiRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiArtifact {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size_in_bytes: u64,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub archive_download_url: Option<String>,
}

impl ApiArtifact {
    pub fn summarize(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id,
            name: self.name.clone(),
            size_in_bytes: self.size_in_bytes,
            expired: self.expired,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            archive_download_url: self.archive_download_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiArtifactList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub artifacts: Vec<ApiArtifact>,
}

#[derive(Serialize)]
pub(crate) struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[derive(Serialize)]
pub(crate) struct RunParams<'a> {
    pub head_sha: &'a str,
    pub per_page: u8,
}
