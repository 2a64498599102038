use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ScanError, util::extract_github_url};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    Linux,
    Windows,
    #[serde(rename = "macOS")]
    MacOS,
}

/// Every platform a build must report on to be selectable, in output order.
pub const ALL_PLATFORMS: &[Platform] = &[Platform::Linux, Platform::Windows, Platform::MacOS];

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::MacOS => "macOS",
        }
    }

    /// GitHub-hosted runner label the platform's reports are produced on.
    pub fn runner(self) -> &'static str {
        match self {
            Self::Linux => "ubuntu-latest",
            Self::Windows => "windows-latest",
            Self::MacOS => "macos-latest",
        }
    }

    /// Classify a free-text label such as an artifact or file name.
    /// Matching is case-insensitive and the first matching rule wins.
    pub fn detect(label: &str) -> Option<Self> {
        let lowered = label.to_lowercase();
        if lowered.contains("ubuntu") || lowered.contains("linux") {
            Some(Self::Linux)
        } else if lowered.contains("windows") {
            Some(Self::Windows)
        } else if lowered.contains("macos") || lowered.contains("mac") {
            Some(Self::MacOS)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Raw gtest JSON documents for one commit, keyed by platform.
/// Inserting an existing platform replaces the previous document.
pub type PlatformReports = BTreeMap<Platform, Value>;

pub fn missing_platforms(reports: &PlatformReports) -> Vec<Platform> {
    ALL_PLATFORMS.iter().copied().filter(|p| !reports.contains_key(p)).collect()
}

pub fn has_all_platforms(reports: &PlatformReports) -> bool {
    ALL_PLATFORMS.iter().all(|p| reports.contains_key(p))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryTarget {
    pub owner: String,
    pub name: String,
}

impl RepositoryTarget {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into() }
    }

    /// `owner/name`, the key used for per-repository configuration.
    pub fn key(&self) -> String { format!("{}/{}", self.owner, self.name) }
}

impl FromStr for RepositoryTarget {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((owner, repo)) = extract_github_url(s) {
            return Ok(Self::new(owner, repo));
        }
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self::new(owner, repo))
            }
            _ => Err(ScanError::InvalidRepository(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepositoryTarget {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<RepositoryTarget> for String {
    fn from(value: RepositoryTarget) -> Self { value.key() }
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub sha: String,
    pub message: Option<String>,
    pub author_name: Option<String>,
    pub author_date: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: u64,
    pub name: Option<String>,
    pub workflow_name: Option<String>,
    pub event: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub html_url: Option<String>,
    pub run_number: Option<u64>,
    pub head_branch: Option<String>,
    pub head_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    pub expired: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub archive_download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSummary {
    pub platform: Platform,
    pub tests: usize,
    pub failures: usize,
    pub errors: usize,
    pub total_ms: f64,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub platforms: Vec<PlatformSummary>,
    pub mean_total_ms: f64,
    pub max_total_ms: f64,
}

/// Everything learned about one visited commit, whether or not it was selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitScan {
    pub commit: CommitInfo,
    pub runs: Vec<RunSummary>,
    pub selected_build_run: Option<RunSummary>,
    pub artifacts: Vec<ArtifactSummary>,
    pub performance: PerformanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryScan {
    pub repository: String,
    pub base_commit_sha: Option<String>,
    pub scanned_commit_count: usize,
    pub commits: Vec<CommitScan>,
}
