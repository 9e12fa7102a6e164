use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendwatch::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "trendwatch",
    version,
    about = "Trending vocabulary detection over an OpenSearch corpus",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and populate the analysis index from the source index
    Sync,

    /// Run the trends pipeline once and publish the result
    Compute {
        /// Reference date (ISO-8601); defaults to now truncated to the granularity
        #[arg(short, long)]
        date: Option<String>,

        /// Print the trends without publishing them
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Write Prometheus metrics to this file after the run
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Show the latest published trend result
    Show {
        /// Look up related terms for each trend
        #[arg(long, default_value = "false")]
        related: bool,
    },

    /// Compute and publish trends every day
    Schedule {
        /// Time of day in UTC (HH:MM); defaults to the configured schedule time
        #[arg(long)]
        at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Initialize tracing/logging
    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    tracing::info!(
        index = %config.opensearch.index_name,
        granularity = %config.trends.granularity,
        "trendwatch starting"
    );

    match cli.command {
        Commands::Sync => {
            tracing::info!(
                source = %config.opensearch.source_index,
                dest = %config.opensearch.index_name,
                "Starting sync command"
            );
            commands::sync(&config).await?;
        }

        Commands::Compute {
            date,
            dry_run,
            metrics_out,
        } => {
            tracing::info!(
                date = ?date,
                dry_run = %dry_run,
                metrics_out = ?metrics_out,
                "Starting compute command"
            );
            let args = commands::ComputeArgs {
                date,
                dry_run,
                metrics_out,
            };
            commands::compute(&config, args).await?;
        }

        Commands::Show { related } => {
            tracing::info!(related = %related, "Starting show command");
            commands::show(&config, related).await?;
        }

        Commands::Schedule { at } => {
            tracing::info!(at = ?at, "Starting schedule command");
            commands::schedule(&config, at).await?;
        }
    }

    tracing::info!("trendwatch completed successfully");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("trendwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("trendwatch={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
