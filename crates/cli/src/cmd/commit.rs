use std::path::{Path, PathBuf};

use anyhow::Result;
use argp::FromArgs;
use gtest_scout_core::{config::Config, models::RepositoryTarget};
use gtest_scout_github::{GitHub, pinned::pinned_document};
use time::OffsetDateTime;
use typed_path::Utf8NativePathBuf;

use crate::{
    cmd::{load_config, write_output},
    util::native_path,
};

#[derive(FromArgs, PartialEq, Debug)]
/// Report the gtest results of a single commit.
#[argp(subcommand, name = "commit")]
pub struct Args {
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// YAML config file
    config: Option<Utf8NativePathBuf>,
    #[argp(option, short = 'r')]
    /// repository, as owner/repo or a GitHub URL
    repo: Option<String>,
    #[argp(option, short = 's')]
    /// commit sha
    sha: Option<String>,
    #[argp(option)]
    /// workflow run the snapshots were saved from
    fallback_run_id: Option<u64>,
    #[argp(option, from_str_fn(native_path))]
    /// directory of saved reports used when GitHub can't be reached
    snapshots: Option<Utf8NativePathBuf>,
    #[argp(option, short = 'o', from_str_fn(native_path))]
    /// write the JSON report to output file
    output: Option<Utf8NativePathBuf>,
}

/// Apply the flags over the loaded config. Returns the snapshot directory.
fn apply_args(config: &mut Config, args: &Args) -> Result<Option<PathBuf>> {
    if let Some(repo) = &args.repo {
        config.pinned.repository = repo.parse::<RepositoryTarget>()?;
    }
    if let Some(sha) = &args.sha {
        if *sha != config.pinned.sha {
            // The configured run belongs to the configured commit
            config.pinned.fallback_run_id = None;
        }
        config.pinned.sha = sha.clone();
    }
    if let Some(run_id) = args.fallback_run_id {
        config.pinned.fallback_run_id = Some(run_id);
    }
    Ok(match &args.snapshots {
        Some(dir) => Some(Path::new(dir.as_str()).to_path_buf()),
        None => config.snapshots.as_ref().map(|s| s.dir.clone()),
    })
}

pub async fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    let snapshots = apply_args(&mut config, &args)?;

    let github = GitHub::new(&config.github)?;
    let document = pinned_document(
        &github,
        &config.pinned,
        snapshots.as_deref(),
        OffsetDateTime::now_utc(),
    )
    .await?;
    write_output(&document, args.output.as_ref())
}
