use anyhow::{Context, Result, anyhow};
use argp::FromArgs;
use gtest_scout_core::{
    config::{Config, parse_max_age},
    models::RepositoryTarget,
};
use gtest_scout_github::{GitHub, scan::scan_repositories};
use time::OffsetDateTime;
use typed_path::Utf8NativePathBuf;

use crate::{
    cmd::{load_config, write_output},
    util::native_path,
};

#[derive(FromArgs, PartialEq, Debug)]
/// Scan recent commits of every repository and report the newest one with
/// gtest reports for all platforms.
#[argp(subcommand, name = "scan")]
pub struct Args {
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// YAML config file
    config: Option<Utf8NativePathBuf>,
    #[argp(option, short = 'r')]
    /// repository to scan, as owner/repo or a GitHub URL (repeatable)
    repo: Vec<String>,
    #[argp(option, short = 'b')]
    /// base commit as owner/repo=sha; only newer commits are scanned (repeatable)
    base: Vec<String>,
    #[argp(option, short = 'd')]
    /// maximum commit age in days
    max_age_days: Option<String>,
    #[argp(option, short = 'o', from_str_fn(native_path))]
    /// write the JSON report to output file
    output: Option<Utf8NativePathBuf>,
}

/// Command-line flags take precedence over the config file and environment.
fn apply_args(config: &mut Config, args: &Args) -> Result<()> {
    if !args.repo.is_empty() {
        config.scan.repositories = args
            .repo
            .iter()
            .map(|repo| repo.parse::<RepositoryTarget>())
            .collect::<Result<_, _>>()?;
    }
    for base in &args.base {
        let (repo, sha) =
            base.split_once('=').ok_or_else(|| anyhow!("Invalid base commit: {base}"))?;
        let repo = repo.parse::<RepositoryTarget>()?;
        config.scan.base_commits.insert(repo.key(), sha.trim().to_string());
    }
    if let Some(days) = &args.max_age_days {
        config.scan.max_commit_age_days = parse_max_age(days)?;
    }
    Ok(())
}

pub async fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    apply_args(&mut config, &args)?;

    let github = GitHub::new(&config.github)?;
    let result = scan_repositories(&github, &config.scan, OffsetDateTime::now_utc())
        .await
        .context("Scan failed")?;
    let document = result.into_document(&config.scan, OffsetDateTime::now_utc())?;
    write_output(&document, args.output.as_ref())
}
