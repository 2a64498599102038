mod cmd;
mod util;

use std::process::ExitCode;

use argp::FromArgs;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(FromArgs, PartialEq, Debug)]
/// Find the newest commit with gtest reports for Linux, Windows and macOS.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Scan(cmd::scan::Args),
    Commit(cmd::commit::Args),
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(env_filter))
        .init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let result = match args.command {
        SubCommand::Scan(args) => cmd::scan::run(args).await,
        SubCommand::Commit(args) => cmd::commit::run(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}
