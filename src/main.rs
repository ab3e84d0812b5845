mod client;
mod config;
mod error;
mod models;
mod services;

use crate::client::PagesClient;
use crate::config::{Config, Overrides};
use crate::models::CleanupCheck;
use crate::services::CleanupService;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prunes stale Cloudflare Pages deployments, keeping the newest and any live ones.
#[derive(Debug, Parser)]
#[command(name = "pages-pruner", version)]
struct Cli {
    /// JSON config file
    #[arg(long, env = "PAGES_PRUNER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Number of most recent deployments to keep per project
    #[arg(long, global = true)]
    keep: Option<usize>,

    /// Page size used when listing deployments
    #[arg(long, global = true)]
    per_page: Option<u32>,

    /// Project to process; repeat for several. Defaults to every project in the account
    #[arg(long = "project", global = true)]
    projects: Vec<String>,

    /// Report what would be deleted without deleting anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Exit 0 even when some projects could not be fetched
    #[arg(long, global = true)]
    allow_partial: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Delete stale deployments and print the run summary (default)
    Cleanup,
    /// Print whether any project holds more deployments than the retention window
    Check,
}

const EXIT_FATAL: u8 = 1;
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pages_pruner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let command = cli.command.unwrap_or(Command::Cleanup);
    let overrides = Overrides {
        config_path: cli.config,
        keep_count: cli.keep,
        per_page: cli.per_page,
        projects: cli.projects,
        dry_run: cli.dry_run,
    };

    let config = match Config::load(&overrides) {
        Ok(config) => config,
        Err(err) => {
            if matches!(command, Command::Check) {
                print_json(&CleanupCheck::unavailable(err.to_string()))?;
            }
            return Err(err.into());
        }
    };
    tracing::info!("Starting pages-pruner with config: {:?}", config);

    let keep_count = config.keep_count;
    let client = match PagesClient::from_config(&config) {
        Ok(client) => client,
        Err(err) => {
            if matches!(command, Command::Check) {
                print_json(&CleanupCheck::unavailable(err.to_string()))?;
            }
            return Err(err.into());
        }
    };
    let service = CleanupService::new(client, config);

    match command {
        Command::Check => {
            let check = service.check_all(keep_count).await;
            print_json(&check)?;
            if check.reason.is_some() {
                return Ok(ExitCode::from(EXIT_FATAL));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Cleanup => {
            let projects = service.resolve_projects().await?;
            let summary = service.run(&projects, keep_count).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.has_failed_projects() && !cli.allow_partial {
                tracing::warn!(
                    projects_failed = summary.totals.projects_failed,
                    "Some projects could not be processed"
                );
                return Ok(ExitCode::from(EXIT_PARTIAL));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
