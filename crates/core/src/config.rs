use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{ScanError, models::RepositoryTarget};

pub const DEFAULT_REPOSITORY: &str = "etib-corp/utility";
pub const DEFAULT_BASE_COMMIT: &str = "5e5e76cf451bccddaf1b38245b6085695b69f7fa";
pub const DEFAULT_MAX_COMMIT_AGE_DAYS: u32 = 90;
/// Workflow run the default commit's saved snapshots were taken from.
pub const DEFAULT_FALLBACK_RUN_ID: u64 = 22392812167;

pub const ENV_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_TARGET_REPOS: &str = "GITHUB_TARGET_REPOS";
pub const ENV_BASE_COMMITS: &str = "GITHUB_BASE_COMMIT_BY_REPO";
pub const ENV_MAX_COMMIT_AGE_DAYS: &str = "GITHUB_MAX_COMMIT_AGE_DAYS";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub scan: ScanConfig,
    pub pinned: PinnedConfig,
    pub snapshots: Option<SnapshotConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub repositories: Vec<RepositoryTarget>,
    /// Base commit per `owner/repo`; only commits newer than it are scanned.
    pub base_commits: BTreeMap<String, String>,
    pub max_commit_age_days: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            repositories: vec![default_repository()],
            base_commits: default_base_commits(),
            max_commit_age_days: DEFAULT_MAX_COMMIT_AGE_DAYS,
        }
    }
}

impl ScanConfig {
    pub fn base_commit(&self, repository: &RepositoryTarget) -> Option<&str> {
        self.base_commits.get(&repository.key()).map(String::as_str)
    }

    pub fn repository_keys(&self) -> Vec<String> {
        self.repositories.iter().map(RepositoryTarget::key).collect()
    }
}

/// Target of the `commit` command.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PinnedConfig {
    pub repository: RepositoryTarget,
    pub sha: String,
    /// Run the snapshots of `sha` were saved from, echoed in the output.
    pub fallback_run_id: Option<u64>,
}

impl Default for PinnedConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            sha: DEFAULT_BASE_COMMIT.to_string(),
            fallback_run_id: Some(DEFAULT_FALLBACK_RUN_ID),
        }
    }
}

/// Directory of previously saved reports, named
/// `test-results-<runner>-<sha>.json`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
}

fn default_repository() -> RepositoryTarget {
    RepositoryTarget::new("etib-corp", "utility")
}

pub fn default_base_commits() -> BTreeMap<String, String> {
    BTreeMap::from([(DEFAULT_REPOSITORY.to_string(), DEFAULT_BASE_COMMIT.to_string())])
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = BufReader::new(
            File::open(path)
                .with_context(|| format!("Failed to open config file {}", path.display()))?,
        );
        serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply overrides from the process environment. `var` looks up a variable.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = var(ENV_TOKEN).filter(|t| !t.is_empty()) {
            self.github.token = Some(token);
        }
        if let Some(value) = var(ENV_TARGET_REPOS) {
            self.scan.repositories = parse_repository_list(&value)
                .with_context(|| format!("Invalid {ENV_TARGET_REPOS}"))?;
        }
        if let Some(value) = var(ENV_BASE_COMMITS) {
            self.scan.base_commits = match parse_base_commit_map(&value) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Ignoring {}: {}; using defaults", ENV_BASE_COMMITS, e);
                    default_base_commits()
                }
            };
        }
        if let Some(value) = var(ENV_MAX_COMMIT_AGE_DAYS) {
            self.scan.max_commit_age_days = parse_max_age(&value)?;
        }
        Ok(())
    }
}

/// Parse a comma-separated list of `owner/repo` identifiers. Blank items are skipped.
pub fn parse_repository_list(value: &str) -> Result<Vec<RepositoryTarget>, ScanError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse)
        .collect()
}

/// Parse a JSON object mapping `owner/repo` to a base commit sha.
pub fn parse_base_commit_map(value: &str) -> serde_json::Result<BTreeMap<String, String>> {
    serde_json::from_str(value)
}

pub fn parse_max_age(value: &str) -> Result<u32, ScanError> {
    value.trim().parse().map_err(|_| ScanError::InvalidMaxAge(value.to_string()))
}
