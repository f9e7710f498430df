//! davpush command line entry point.

mod storage;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use davpush_host::{HostEvent, PublishSession, Settings, settings_path};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "davpush", version)]
#[command(about = "Publish backups, timelapses and print files to a remote store", long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.config/davpush/settings.toml).
    #[arg(long, global = true, env = "DAVPUSH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Check that the configured remote store is reachable")]
    Test,
    #[command(about = "Publish a backup archive")]
    Backup { file: PathBuf },
    #[command(about = "Publish a rendered timelapse")]
    Timelapse { file: PathBuf },
    #[command(about = "Publish an uploaded print file")]
    Upload { file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let path = cli.config.unwrap_or_else(settings_path);
    let settings = Settings::load_from(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    tracing::debug!(path = %path.display(), "settings loaded");

    let mut session = PublishSession::new(settings, storage::factory())?;

    let ok = match cli.command {
        Command::Test => {
            let result = session.test_connection();
            print_json(&result)?;
            result.reachable
        }
        Command::Backup { file } => publish(&mut session, HostEvent::backup(file))?,
        Command::Timelapse { file } => publish(&mut session, HostEvent::timelapse(file))?,
        Command::Upload { file } => publish(&mut session, HostEvent::file_added(file))?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn publish(session: &mut PublishSession, event: HostEvent) -> anyhow::Result<bool> {
    match session.handle_event(&event)? {
        Some(outcome) => {
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        None => {
            tracing::warn!(
                event = event.label(),
                "publishing is disabled for this event type"
            );
            Ok(true)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
