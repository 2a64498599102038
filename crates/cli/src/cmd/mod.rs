pub mod commit;
pub mod scan;

use anyhow::{Context, Result};
use gtest_scout_core::{config::Config, summary::ReportDocument};
use typed_path::Utf8NativePathBuf;

/// Defaults, then the config file if given, then the environment.
fn load_config(path: Option<&Utf8NativePathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path.as_str())?,
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok()).context("Invalid environment")?;
    Ok(config)
}

fn write_output(document: &ReportDocument, output: Option<&Utf8NativePathBuf>) -> Result<()> {
    let json = document.to_json()?;
    if let Some(out_path) = output {
        std::fs::write(out_path.with_platform_encoding(), json)
            .with_context(|| format!("Failed to write output file '{}'", out_path))?;
        tracing::info!("Wrote {}", out_path);
    } else {
        print!("{}", json);
    }
    Ok(())
}
