//! Settle CLI - settle command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

/// Settle - trailing-edge debouncing for line streams
#[derive(Parser)]
#[command(name = "settle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debounce decisions to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Debounce lines read from stdin and print the ones that settle
    Run {
        /// Quiet period in milliseconds (default: from config, else 300)
        #[arg(long, allow_negative_numbers = true)]
        delay_ms: Option<i64>,

        /// Debounce per key, reading lines as key<separator>payload
        #[arg(long)]
        keyed: bool,

        /// Key/payload separator for --keyed (default: ":")
        #[arg(long)]
        separator: Option<String>,

        /// Timer backend: tokio or thread
        #[arg(long)]
        scheduler: Option<String>,

        /// Print fired events as JSON lines
        #[arg(long)]
        json: bool,

        /// Config file to use instead of the user config
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,

    /// Get a single value (e.g. debounce.delay_ms)
    Get {
        /// Config key
        key: String,
    },

    /// Set a single value
    Set {
        /// Config key
        key: String,
        /// New value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Show the config file path
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },

    /// Print an annotated example config
    Example,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // Stdout carries fired events; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { delay_ms, keyed, separator, scheduler, json, config } => {
            cmd::run::run(cmd::run::RunArgs {
                delay_ms,
                keyed,
                separator,
                scheduler,
                json,
                config,
            })
            .await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
