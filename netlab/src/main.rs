mod config;
mod experiment;
mod runtime;

use crate::config::cli::{CliOpt, Command};
use crate::runtime::Runtime;
use crate::runtime::netns::NetnsRuntime;
use crate::runtime::recording::RecordingRuntime;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = CliOpt::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio")?;

    rt.block_on(run(options))
}

async fn run(options: CliOpt) -> anyhow::Result<()> {
    let open_cli = !options.no_cli && !options.dry_run;

    if options.dry_run {
        let mut runtime = RecordingRuntime::new();
        dispatch(&mut runtime, &options, open_cli).await?;

        println!("--- Commands ---");
        for command in &runtime.commands {
            println!("{command}");
        }
        return Ok(());
    }

    let mut runtime = NetnsRuntime::new("netlab");
    let result = dispatch(&mut runtime, &options, open_cli).await;
    if result.is_err() {
        // The drivers only stop the runtime on success; clean up what was
        // already instantiated before reporting the error
        runtime.stop().await.ok();
    }
    result
}

async fn dispatch<R: Runtime>(
    runtime: &mut R,
    options: &CliOpt,
    open_cli: bool,
) -> anyhow::Result<()> {
    match &options.command {
        Command::Routing(opts) => experiment::routing::run(runtime, opts, open_cli).await,
        Command::Congestion(opts) => experiment::congestion::run(runtime, opts, open_cli).await,
    }
}
