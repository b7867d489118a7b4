//! Webpage monitor — binary entrypoint.
//! One pass per invocation; schedule it from cron or a systemd timer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pagewatch::artifact::PdfArchiver;
use pagewatch::config::{AppConfig, DEFAULT_CONFIG_PATH};
use pagewatch::fetch::HttpFetcher;
use pagewatch::notify::NotifierMux;
use pagewatch::runner::{self, Runner, SourceOutcome};
use pagewatch::state::StateStore;

#[derive(Parser, Debug)]
#[command(name = "pagewatch", about = "Monitors web pages for updates and sends notifications")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all enabled sources once (the default)
    Run,
    /// Send a synthetic event through every configured channel and topic
    TestNotifications,
    /// Clear all persisted state and error counters
    ResetState,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagewatch=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let notifier = NotifierMux::from_config(&config.notifications)
        .context("building notification channels")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::TestNotifications => {
            tracing::info!("sending test notifications");
            runner::send_test_notifications(&config, &notifier).await;
        }
        Command::ResetState => {
            let mut store = StateStore::load(&config.settings.state_file)?;
            store.reset_all()?;
            tracing::info!("state reset");
        }
        Command::Run => {
            let settings = &config.settings;
            let fetcher = HttpFetcher::new(
                &settings.user_agent,
                settings.max_retries,
                settings.retry_delay_secs,
            )?;
            let archiver = PdfArchiver::new(settings.download_dir.clone());
            let mut store = StateStore::load(&settings.state_file)?;

            let runner = Runner::new(&fetcher, &notifier, settings.escalation_threshold)
                .with_artifacts(&archiver);
            let summary = runner.run_pass(&config.sources, &mut store).await?;

            for (id, outcome) in &summary.outcomes {
                match outcome {
                    SourceOutcome::Updated => tracing::info!(source = %id, "updated"),
                    SourceOutcome::Unchanged => tracing::info!(source = %id, "unchanged"),
                    SourceOutcome::Skipped => tracing::debug!(source = %id, "skipped"),
                    SourceOutcome::Failed { errors, escalated } => {
                        tracing::warn!(source = %id, errors, escalated, "failed")
                    }
                }
            }
            tracing::info!(
                updated = summary.updated_count(),
                failed = summary.failed_count(),
                total = summary.outcomes.len(),
                "pass complete"
            );
        }
    }

    Ok(())
}
