use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    io::{Cursor, Write},
};

use anyhow::{Result, anyhow, bail};
use bytes::Bytes;
use gtest_scout_core::models::{Platform, RepositoryTarget};
use serde_json::{Value, json};
use zip::{CompressionMethod, write::SimpleFileOptions};

use crate::{ActionsSource, ApiArtifact, ApiCommit, ApiCommitDetail, ApiGitActor, ApiRun};

/// In-memory GitHub with fixed responses.
#[derive(Default)]
pub struct FakeSource {
    commits: HashMap<String, Vec<ApiCommit>>,
    runs: HashMap<String, Vec<ApiRun>>,
    artifacts: HashMap<u64, Vec<ApiArtifact>>,
    archives: HashMap<u64, Vec<u8>>,
    failing_downloads: HashSet<u64>,
    failing_repositories: HashSet<String>,
    downloads: RefCell<Vec<u64>>,
    next_id: u64,
}

impl FakeSource {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Append a commit to a repository's history. Add commits newest first.
    pub fn add_commit(&mut self, repo: &RepositoryTarget, sha: &str, date: &str) {
        self.commits.entry(repo.key()).or_default().push(ApiCommit {
            sha: sha.to_string(),
            html_url: Some(format!("https://github.com/{}/commit/{}", repo, sha)),
            commit: ApiCommitDetail {
                message: Some(format!("Commit {sha}")),
                author: Some(ApiGitActor {
                    name: Some("Dev".to_string()),
                    date: Some(date.to_string()),
                }),
            },
        });
    }

    pub fn add_run(&mut self, sha: &str, name: &str, conclusion: Option<&str>) -> u64 {
        let id = self.next_id();
        self.runs.entry(sha.to_string()).or_default().push(ApiRun {
            id,
            name: Some(name.to_string()),
            display_title: Some(format!("Commit {sha}")),
            event: Some("push".to_string()),
            status: Some("completed".to_string()),
            conclusion: conclusion.map(str::to_string),
            head_branch: Some("main".to_string()),
            head_sha: sha.to_string(),
            run_number: Some(id),
            ..Default::default()
        });
        id
    }

    pub fn add_artifact(&mut self, run_id: u64, name: &str, archive: Vec<u8>) -> u64 {
        let id = self.next_id();
        self.artifacts.entry(run_id).or_default().push(ApiArtifact {
            id,
            name: name.to_string(),
            size_in_bytes: archive.len() as u64,
            ..Default::default()
        });
        self.archives.insert(id, archive);
        id
    }

    /// A successful build run with one artifact per platform.
    pub fn add_reports(&mut self, sha: &str, platforms: &[Platform]) -> u64 {
        let run_id = self.add_run(sha, "Build", Some("success"));
        for platform in platforms {
            let report = gtest_report("PerformanceSuite", &[sha]).to_string();
            self.add_artifact(
                run_id,
                &format!("test-results-{}", platform.runner()),
                zip_archive(&[("test_detail.json", &report)]),
            );
        }
        run_id
    }

    pub fn expire_artifact(&mut self, run_id: u64, artifact_id: u64) {
        for artifact in self.artifacts.entry(run_id).or_default() {
            if artifact.id == artifact_id {
                artifact.expired = true;
            }
        }
    }

    pub fn fail_download(&mut self, artifact_id: u64) { self.failing_downloads.insert(artifact_id); }

    pub fn fail_repository(&mut self, repo: &RepositoryTarget) {
        self.failing_repositories.insert(repo.key());
    }

    pub fn downloads(&self) -> Vec<u64> { self.downloads.borrow().clone() }
}

impl ActionsSource for FakeSource {
    async fn list_commits(&self, repo: &RepositoryTarget) -> Result<Vec<ApiCommit>> {
        if self.failing_repositories.contains(&repo.key()) {
            bail!("Service unavailable");
        }
        Ok(self.commits.get(&repo.key()).cloned().unwrap_or_default())
    }

    async fn list_runs(&self, _repo: &RepositoryTarget, sha: &str) -> Result<Vec<ApiRun>> {
        Ok(self.runs.get(sha).cloned().unwrap_or_default())
    }

    async fn list_artifacts(&self, _repo: &RepositoryTarget, run_id: u64) -> Result<Vec<ApiArtifact>> {
        Ok(self.artifacts.get(&run_id).cloned().unwrap_or_default())
    }

    async fn download_artifact(&self, _repo: &RepositoryTarget, artifact_id: u64) -> Result<Bytes> {
        self.downloads.borrow_mut().push(artifact_id);
        if self.failing_downloads.contains(&artifact_id) {
            bail!("Artifact {artifact_id} download failed");
        }
        self.archives
            .get(&artifact_id)
            .cloned()
            .map(Bytes::from)
            .ok_or_else(|| anyhow!("Artifact {artifact_id} not found"))
    }
}

/// A gtest report with one suite containing the given completed tests.
pub fn gtest_report(suite: &str, tests: &[&str]) -> Value {
    let cases = tests
        .iter()
        .map(|name| json!({ "name": name, "time": "0.5s", "result": "COMPLETED" }))
        .collect::<Vec<_>>();
    json!({
        "tests": tests.len(),
        "failures": 0,
        "errors": 0,
        "timestamp": "2024-02-01T10:00:00Z",
        "testsuites": [{ "name": suite, "tests": tests.len(), "testsuite": cases }]
    })
}

pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for &(name, contents) in entries {
        writer.start_file(name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
