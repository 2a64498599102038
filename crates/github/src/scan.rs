//! Commit window scanning and cross-repository selection.

use anyhow::{Context, Result};
use gtest_scout_core::{
    ScanError,
    config::ScanConfig,
    models::{CommitScan, RepositoryScan, RepositoryTarget},
    report::summarize_performance,
    summary::{ActionsMetadata, ReportDocument, SelectedCommit, SourceInfo, SourceMode, aggregate},
    util::format_timestamp,
};
use time::{Duration, OffsetDateTime};

use crate::{
    ActionsSource, ApiCommit,
    runs::{CommitActions, fetch_actions_for_commit},
};

/// Restrict a newest-first history to the commits after `base_commit` whose
/// author date lies within `max_age_days` of `now`.
pub fn eligible_commits(
    repo: &RepositoryTarget,
    mut commits: Vec<ApiCommit>,
    base_commit: Option<&str>,
    max_age_days: u32,
    now: OffsetDateTime,
) -> Result<Vec<ApiCommit>, ScanError> {
    if let Some(base_commit) = base_commit {
        let Some(index) = commits.iter().position(|c| c.sha == base_commit) else {
            return Err(ScanError::BaseCommitNotFound {
                repository: repo.key(),
                sha: base_commit.to_string(),
            });
        };
        commits.truncate(index);
    }
    let cutoff = now - Duration::days(i64::from(max_age_days));
    commits.retain(|c| c.timestamp().is_some_and(|timestamp| timestamp >= cutoff));
    Ok(commits)
}

/// The first commit of a repository with reports for every platform.
#[derive(Debug, Clone)]
pub struct Selection {
    pub repository: RepositoryTarget,
    pub commit: ApiCommit,
    pub actions: CommitActions,
}

#[derive(Debug, Clone)]
pub struct RepositoryOutcome {
    pub scan: RepositoryScan,
    pub selection: Option<Selection>,
}

/// Visit every eligible commit of a repository, newest first. Each visited
/// commit is recorded; the first with full coverage becomes the selection.
pub async fn scan_repository<S: ActionsSource>(
    source: &S,
    repo: &RepositoryTarget,
    base_commit: Option<&str>,
    max_age_days: u32,
    now: OffsetDateTime,
) -> Result<RepositoryOutcome> {
    let history = source.list_commits(repo).await?;
    let candidates = eligible_commits(repo, history, base_commit, max_age_days, now)?;
    tracing::info!(
        "Scanning {} commits of {} (base {}, {} days)",
        candidates.len(),
        repo,
        base_commit.unwrap_or("none"),
        max_age_days
    );

    let mut commits = Vec::with_capacity(candidates.len());
    let mut selection = None;
    for commit in candidates {
        let actions = fetch_actions_for_commit(source, repo, &commit.sha)
            .await
            .with_context(|| format!("Failed to fetch actions for {}@{}", repo, commit.sha))?;
        commits.push(CommitScan {
            commit: commit.summarize(),
            runs: actions.runs.clone(),
            selected_build_run: actions.selected_build_run.clone(),
            artifacts: actions.artifacts.clone(),
            performance: summarize_performance(&actions.reports),
        });
        if selection.is_none() && actions.has_all_platforms() {
            tracing::info!("Selected {}@{} ({})", repo, commit.sha, commit.author_date().unwrap_or("?"));
            selection = Some(Selection { repository: repo.clone(), commit, actions });
        }
    }
    if selection.is_none() {
        tracing::warn!("No commit of {} has reports for every platform", repo);
    }

    Ok(RepositoryOutcome {
        scan: RepositoryScan {
            repository: repo.key(),
            base_commit_sha: base_commit.map(str::to_string),
            scanned_commit_count: commits.len(),
            commits,
        },
        selection,
    })
}

/// Keep the item with the most recent timestamp. Ties and items without a
/// timestamp never displace an earlier item.
pub fn pick_newest<T>(
    items: impl IntoIterator<Item = T>,
    timestamp: impl Fn(&T) -> Option<OffsetDateTime>,
) -> Option<T> {
    items.into_iter().reduce(|best, item| match (timestamp(&best), timestamp(&item)) {
        (Some(a), Some(b)) if b > a => item,
        _ => best,
    })
}

/// Result of scanning every configured repository.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub scans: Vec<RepositoryScan>,
    pub selection: Selection,
    /// Scan trail of the repository the selection came from.
    pub selected_scan: RepositoryScan,
}

pub async fn scan_repositories<S: ActionsSource>(
    source: &S,
    config: &ScanConfig,
    now: OffsetDateTime,
) -> Result<ScanResult> {
    let mut scans = Vec::with_capacity(config.repositories.len());
    let mut selections = Vec::new();
    for repo in &config.repositories {
        let outcome =
            scan_repository(source, repo, config.base_commit(repo), config.max_commit_age_days, now)
                .await
                .with_context(|| format!("Failed to scan {repo}"))?;
        if let Some(selection) = outcome.selection {
            selections.push((selection, outcome.scan.clone()));
        }
        scans.push(outcome.scan);
    }
    let Some((selection, selected_scan)) =
        pick_newest(selections, |(selection, _)| selection.commit.timestamp())
    else {
        return Err(ScanError::NoUsableArtifacts {
            repositories: config.repository_keys(),
            max_age_days: config.max_commit_age_days,
        }
        .into());
    };
    tracing::info!(
        "Using {}@{} from {} scanned repositories",
        selection.repository,
        selection.commit.sha,
        scans.len()
    );
    Ok(ScanResult { scans, selection, selected_scan })
}

impl ScanResult {
    /// Aggregate the selected commit's reports into the output document.
    pub fn into_document(self, config: &ScanConfig, fetched_at: OffsetDateTime) -> Result<ReportDocument> {
        let ScanResult { scans, selection, selected_scan } = self;
        let Selection { repository, commit, actions } = selection;
        let aggregate = aggregate(actions.reports)?;
        let source = SourceInfo {
            owner: repository.owner.clone(),
            repo: repository.name.clone(),
            commit_sha: commit.sha.clone(),
            fallback_run_id: None,
            base_commit_sha: config.base_commit(&repository).map(str::to_string),
            max_commit_age_days: Some(config.max_commit_age_days),
            mode: SourceMode::GithubArtifacts,
            repositories: Some(config.repository_keys()),
            fetched_at: format_timestamp(fetched_at),
        };
        let commit = SelectedCommit { repository: repository.key(), commit: commit.summarize() };
        let actions = ActionsMetadata {
            repository: Some(repository.key()),
            runs: None,
            selected_build_run: actions.selected_build_run,
            artifacts: actions.artifacts,
            scanned_commit_count: Some(selected_scan.scanned_commit_count),
            commits: Some(selected_scan.commits),
            scanned_repositories: Some(scans),
        };
        Ok(ReportDocument::new(source, Some(commit), Some(actions), aggregate))
    }
}

#[cfg(test)]
mod tests {
    use gtest_scout_core::{
        config::DEFAULT_MAX_COMMIT_AGE_DAYS,
        models::{ALL_PLATFORMS, Platform},
        util::parse_timestamp,
    };
    use serde_json::Value;

    use super::*;
    use crate::testing::FakeSource;

    const LINUX_WINDOWS: &[Platform] = &[Platform::Linux, Platform::Windows];
    const WINDOWS_MACOS: &[Platform] = &[Platform::Windows, Platform::MacOS];

    fn now() -> OffsetDateTime { parse_timestamp("2024-03-01T00:00:00Z").unwrap() }

    fn config(repositories: &[&RepositoryTarget]) -> ScanConfig {
        ScanConfig {
            repositories: repositories.iter().map(|&r| r.clone()).collect(),
            base_commits: Default::default(),
            max_commit_age_days: DEFAULT_MAX_COMMIT_AGE_DAYS,
        }
    }

    fn shas(commits: &[ApiCommit]) -> Vec<&str> { commits.iter().map(|c| c.sha.as_str()).collect() }

    fn history(repo: &RepositoryTarget, commits: &[(&str, &str)]) -> Vec<ApiCommit> {
        let mut source = FakeSource::default();
        for &(sha, date) in commits {
            source.add_commit(repo, sha, date);
        }
        let commits = futures_util::FutureExt::now_or_never(source.list_commits(repo));
        commits.unwrap().unwrap()
    }

    #[test]
    fn test_eligible_commits_base() {
        let repo = RepositoryTarget::new("a", "b");
        let commits = history(&repo, &[
            ("c4", "2024-02-28T00:00:00Z"),
            ("c3", "2024-02-27T00:00:00Z"),
            ("c2", "2024-02-26T00:00:00Z"),
            ("c1", "2024-02-25T00:00:00Z"),
        ]);
        let eligible = eligible_commits(&repo, commits.clone(), Some("c2"), 90, now()).unwrap();
        assert_eq!(shas(&eligible), ["c4", "c3"]);
        let eligible = eligible_commits(&repo, commits.clone(), Some("c4"), 90, now()).unwrap();
        assert!(eligible.is_empty());
        let eligible = eligible_commits(&repo, commits.clone(), None, 90, now()).unwrap();
        assert_eq!(eligible.len(), 4);
        let err = eligible_commits(&repo, commits, Some("c0"), 90, now()).unwrap_err();
        assert!(matches!(err, ScanError::BaseCommitNotFound { ref sha, .. } if sha == "c0"));
    }

    #[test]
    fn test_eligible_commits_window() {
        let repo = RepositoryTarget::new("a", "b");
        let commits = history(&repo, &[
            ("fresh", "2024-02-29T23:59:59Z"),
            ("undated", "sometime"),
            ("edge", "2024-02-20T00:00:00Z"),
            ("stale", "2024-02-19T23:59:59Z"),
            ("older", "2023-12-01T00:00:00Z"),
        ]);
        let cutoff = now() - Duration::days(10);
        let eligible = eligible_commits(&repo, commits.clone(), None, 10, now()).unwrap();
        assert_eq!(shas(&eligible), ["fresh", "edge"]);
        for commit in &commits {
            let included = eligible.iter().any(|c| c.sha == commit.sha);
            let timestamp = commit.timestamp();
            assert_eq!(included, timestamp.is_some_and(|t| t >= cutoff), "{}", commit.sha);
        }
    }

    #[test]
    fn test_pick_newest() {
        let date = |s: &str| parse_timestamp(s);
        let items = [("a", "2024-01-01T00:00:00Z"), ("b", "2024-02-01T00:00:00Z"), ("c", "x")];
        assert_eq!(pick_newest(items, |(_, d)| date(*d)).map(|(n, _)| n), Some("b"));
        let ties = [("a", "2024-01-01T00:00:00Z"), ("b", "2024-01-01T00:00:00Z")];
        assert_eq!(pick_newest(ties, |(_, d)| date(*d)).map(|(n, _)| n), Some("a"));
        let undated = [("a", "x"), ("b", "2024-01-01T00:00:00Z")];
        assert_eq!(pick_newest(undated, |(_, d)| date(*d)).map(|(n, _)| n), Some("a"));
        assert_eq!(pick_newest(Vec::<(&str, &str)>::new(), |(_, d)| date(*d)), None);
    }

    #[tokio::test]
    async fn test_selects_first_fully_covered_commit() {
        let repo = RepositoryTarget::new("etib-corp", "utility");
        let mut source = FakeSource::default();
        source.add_commit(&repo, "c3", "2024-02-20T00:00:00Z");
        source.add_commit(&repo, "c2", "2024-02-10T00:00:00Z");
        source.add_commit(&repo, "c1", "2024-02-01T00:00:00Z");
        source.add_reports("c3", LINUX_WINDOWS);
        source.add_reports("c2", WINDOWS_MACOS);
        source.add_reports("c1", ALL_PLATFORMS);

        let outcome = scan_repository(&source, &repo, None, 90, now()).await.unwrap();
        let selection = outcome.selection.unwrap();
        assert_eq!(selection.commit.sha, "c1");
        assert!(selection.actions.has_all_platforms());
        let trail = outcome.scan.commits.iter().map(|c| c.commit.sha.as_str()).collect::<Vec<_>>();
        assert_eq!(trail, ["c3", "c2", "c1"]);
        assert_eq!(outcome.scan.scanned_commit_count, 3);
        assert_eq!(outcome.scan.commits[0].performance.platforms.len(), 2);
        assert_eq!(outcome.scan.commits[2].performance.platforms.len(), 3);
    }

    #[tokio::test]
    async fn test_later_commits_are_recorded_but_not_selected() {
        let repo = RepositoryTarget::new("a", "b");
        let mut source = FakeSource::default();
        source.add_commit(&repo, "new", "2024-02-20T00:00:00Z");
        source.add_commit(&repo, "mid", "2024-02-10T00:00:00Z");
        source.add_commit(&repo, "old", "2024-02-01T00:00:00Z");
        source.add_commit(&repo, "base", "2024-01-25T00:00:00Z");
        source.add_commit(&repo, "ancient", "2024-01-20T00:00:00Z");
        source.add_reports("new", ALL_PLATFORMS);
        source.add_reports("old", ALL_PLATFORMS);
        source.add_reports("ancient", ALL_PLATFORMS);

        let outcome = scan_repository(&source, &repo, Some("base"), 90, now()).await.unwrap();
        assert_eq!(outcome.selection.unwrap().commit.sha, "new");
        let trail = outcome.scan.commits.iter().map(|c| c.commit.sha.as_str()).collect::<Vec<_>>();
        assert_eq!(trail, ["new", "mid", "old"]);
        assert!(outcome.scan.commits[1].selected_build_run.is_none());
        assert_eq!(outcome.scan.base_commit_sha.as_deref(), Some("base"));
    }

    #[tokio::test]
    async fn test_scan_is_repeatable() {
        let repo = RepositoryTarget::new("a", "b");
        let mut source = FakeSource::default();
        source.add_commit(&repo, "c2", "2024-02-10T00:00:00Z");
        source.add_commit(&repo, "c1", "2024-02-01T00:00:00Z");
        source.add_reports("c2", LINUX_WINDOWS);
        source.add_reports("c1", ALL_PLATFORMS);
        let first = scan_repository(&source, &repo, None, 90, now()).await.unwrap();
        let second = scan_repository(&source, &repo, None, 90, now()).await.unwrap();
        assert_eq!(first.scan, second.scan);
    }

    #[tokio::test]
    async fn test_newest_selection_across_repositories() {
        let repo_a = RepositoryTarget::new("org", "a");
        let repo_b = RepositoryTarget::new("org", "b");
        let mut source = FakeSource::default();
        source.add_commit(&repo_a, "a1", "2024-01-01T00:00:00Z");
        source.add_commit(&repo_b, "b2", "2024-02-05T00:00:00Z");
        source.add_commit(&repo_b, "b1", "2024-02-01T00:00:00Z");
        source.add_reports("a1", ALL_PLATFORMS);
        source.add_reports("b2", LINUX_WINDOWS);
        source.add_reports("b1", ALL_PLATFORMS);

        let config = config(&[&repo_a, &repo_b]);
        let result = scan_repositories(&source, &config, now()).await.unwrap();
        assert_eq!(result.selection.repository, repo_b);
        assert_eq!(result.selection.commit.sha, "b1");
        assert_eq!(result.scans.len(), 2);
        assert_eq!(result.selected_scan.repository, "org/b");
        assert_eq!(result.selected_scan.scanned_commit_count, 2);

        let document = result.into_document(&config, now()).unwrap();
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["source"]["owner"], "org");
        assert_eq!(value["source"]["repo"], "b");
        assert_eq!(value["source"]["commitSha"], "b1");
        assert_eq!(value["source"]["repositories"], serde_json::json!(["org/a", "org/b"]));
        assert_eq!(value["commit"]["repository"], "org/b");
        assert_eq!(value["commit"]["authorDate"], "2024-02-01T00:00:00Z");
        assert_eq!(value["actions"]["scannedCommitCount"], 2);
        assert_eq!(value["actions"]["commits"][0]["commit"]["sha"], "b2");
        assert_eq!(value["actions"]["scannedRepositories"][0]["repository"], "org/a");
        assert_eq!(value["actions"]["artifacts"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["summary"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["tests"][0]["fullName"], "PerformanceSuite.b1");
        assert!(value["raw"]["macOS"].is_object());
        assert!(value["actions"].get("runs").is_none());
        assert_ne!(value["actions"]["selectedBuildRun"], Value::Null);
    }

    #[tokio::test]
    async fn test_no_coverage_anywhere() {
        let repo_a = RepositoryTarget::new("org", "a");
        let repo_b = RepositoryTarget::new("org", "b");
        let mut source = FakeSource::default();
        source.add_commit(&repo_a, "a1", "2024-02-01T00:00:00Z");
        source.add_commit(&repo_b, "b1", "2024-02-01T00:00:00Z");
        source.add_commit(&repo_b, "b0", "2023-01-01T00:00:00Z");
        source.add_reports("a1", LINUX_WINDOWS);
        source.add_reports("b0", ALL_PLATFORMS);

        let err = scan_repositories(&source, &config(&[&repo_a, &repo_b]), now()).await.unwrap_err();
        match err.downcast_ref::<ScanError>() {
            Some(ScanError::NoUsableArtifacts { repositories, max_age_days }) => {
                assert_eq!(repositories, &["org/a", "org/b"]);
                assert_eq!(*max_age_days, DEFAULT_MAX_COMMIT_AGE_DAYS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("org/a, org/b"));
    }

    #[tokio::test]
    async fn test_missing_base_commit_aborts() {
        let repo = RepositoryTarget::new("org", "a");
        let mut source = FakeSource::default();
        source.add_commit(&repo, "a1", "2024-02-01T00:00:00Z");
        source.add_reports("a1", ALL_PLATFORMS);
        let mut config = config(&[&repo]);
        config.base_commits.insert("org/a".to_string(), "gone".to_string());
        let err = scan_repositories(&source, &config, now()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::BaseCommitNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let repo = RepositoryTarget::new("org", "a");
        let mut source = FakeSource::default();
        source.fail_repository(&repo);
        let err = scan_repositories(&source, &config(&[&repo]), now()).await.unwrap_err();
        assert!(format!("{err:#}").contains("Service unavailable"));
    }
}
