//! Debounce lines read from stdin

use anyhow::{Context, Result};
use cli_lib::host::{self, HostSettings};
use cli_lib::system_config;
use settle_core::{SchedulerKind, SettleConfig, ThreadScheduler, TokioScheduler};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::debug;

/// Flags given to `settle run`; unset flags fall back to the config file
#[derive(Debug, Default)]
pub struct RunArgs {
    pub delay_ms: Option<i64>,
    pub keyed: bool,
    pub separator: Option<String>,
    pub scheduler: Option<String>,
    pub json: bool,
    pub config: Option<PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SettleConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => system_config::load()?,
    };

    // Flags override the file
    if let Some(delay_ms) = args.delay_ms {
        config.debounce.delay_ms = delay_ms;
    }
    if let Some(separator) = args.separator {
        config.keyed.separator = separator;
    }
    if let Some(scheduler) = &args.scheduler {
        config.debounce.scheduler = scheduler.parse()?;
    }

    let settings = HostSettings::from_config(&config, args.keyed, args.json)?;
    debug!(?settings, scheduler = %config.debounce.scheduler, "Resolved run settings");

    let input = BufReader::new(tokio::io::stdin());
    let output = std::io::stdout();

    match config.debounce.scheduler {
        SchedulerKind::Tokio => {
            let scheduler = TokioScheduler::current()?;
            host::run(&settings, scheduler, input, output).await?;
        }
        SchedulerKind::Thread => {
            let scheduler = ThreadScheduler::new()?;
            host::run(&settings, scheduler, input, output).await?;
        }
    }

    Ok(())
}
