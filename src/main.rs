//! CLI entry point for mangapdf.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mangapdf_core::{Pipeline, SessionStrategy};
use tracing::{debug, error, info};

mod app_config;
mod cli;

use app_config::{build_run_config, load_file_config_from, session_token};
use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the output path or volume list.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    debug!(?args, "CLI arguments parsed");

    let loaded = load_file_config_from(args.config.as_deref())?;
    if loaded.loaded_from_file
        && let Some(path) = &loaded.path
    {
        debug!(path = %path.display(), "config file loaded");
    }
    let file = loaded.config.as_ref();

    let mut config = build_run_config(&args, file);
    let strategy = SessionStrategy::select(args.auth, session_token(&args, file));
    config.session = strategy
        .establish(&args.url)
        .context("Failed to establish session")?;

    let pipeline = Pipeline::from_config(config)?;

    if args.list_volumes {
        let volumes = pipeline.list_volumes().await?;
        if volumes.is_empty() {
            info!("No volumes published");
        }
        for volume in volumes {
            println!("{volume}");
        }
        return Ok(());
    }

    info!(url = %args.url, "mangapdf starting");
    let summary = pipeline.run().await?;
    info!(
        output = %summary.output.display(),
        volume = %summary.volume,
        chapters = summary.chapters,
        pages = summary.pages,
        dropped = summary.dropped,
        "Done"
    );
    println!("{}", summary.output.display());
    Ok(())
}
