//! geo-db: extract geographic facts from a knowledge-base dump into SQLite

mod commands;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use geo_db::config::{Config, LogFormat};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geo-db")]
#[command(about = "Extract countries, regions, settlements and languages from a Wikidata dump")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ./geo-db.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a dump into a new SQLite database
    Import {
        /// Read a local compressed dump instead of downloading
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Dump URL to stream
        #[arg(long, conflicts_with = "input")]
        url: Option<String>,

        /// Database file to create
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Instant that start/end qualifiers are checked against (RFC 3339)
        #[arg(long)]
        reference_time: Option<DateTime<Utc>>,

        /// Show a progress bar
        #[arg(long)]
        progress_bar: bool,
    },

    /// Fetch single entities and print the rows they would produce
    Entity {
        /// Entity ids, e.g. Q64
        #[arg(required = true)]
        ids: Vec<String>,

        /// Instant that start/end qualifiers are checked against (RFC 3339)
        #[arg(long)]
        reference_time: Option<DateTime<Utc>>,
    },

    /// Write a default configuration file
    Init {
        /// Directory to write geo-db.toml into
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn init_logging(config: &Config, verbose: u8, quiet: bool) -> Result<()> {
    let level = config.logging.level.adjusted(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init needs no config and must work where the existing one is broken
    if let Commands::Init { path } = &cli.command {
        return commands::init::init_config(path.clone());
    }

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    init_logging(&config, cli.verbose, cli.quiet)?;

    let result = match cli.command {
        Commands::Import {
            input,
            url,
            output,
            reference_time,
            progress_bar,
        } => {
            if let Some(input) = input {
                config.source.path = Some(input);
            }
            if let Some(url) = url {
                config.source.path = None;
                config.source.url = url;
            }
            if let Some(output) = output {
                config.output.path = output;
            }
            if reference_time.is_some() {
                config.import.reference_time = reference_time;
            }
            if progress_bar {
                config.import.progress_bar = true;
            }
            config.validate()?;
            commands::import::run_import(config, cli.quiet).await
        }
        Commands::Entity {
            ids,
            reference_time,
        } => {
            if reference_time.is_some() {
                config.import.reference_time = reference_time;
            }
            commands::entity::show_entities(config, ids).await
        }
        Commands::Init { .. } => Ok(()),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
