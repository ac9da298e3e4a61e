//! Configuration management command
//!
//! Provides CLI interface to view and edit the settle config file.

use anyhow::{Context, Result};
use cli_lib::system_config;
use owo_colors::OwoColorize;
use settle_core::config::MAX_DELAY_MS;

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = system_config::load()?;
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    println!("{}", "Settle Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[debounce]".yellow());
    println!(
        "  {} = {} {}",
        "delay_ms".cyan(),
        config.debounce.delay_ms,
        format!("({}ms quiet period)", config.debounce.delay_ms).dimmed()
    );
    println!(
        "  {} = {}",
        "scheduler".cyan(),
        config.debounce.scheduler
    );

    println!("\n{}", "[keyed]".yellow());
    println!(
        "  {} = {:?}",
        "separator".cyan(),
        config.keyed.separator
    );
    println!(
        "  {} = {}",
        "purge_idle".cyan(),
        config.keyed.purge_idle
    );

    println!("\n{}", "Valid Ranges:".bold());
    println!("  delay_ms: 0-{}", MAX_DELAY_MS);
    println!("  scheduler: tokio | thread");
    println!("  separator: any non-empty string");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = system_config::load()?;

    let value = match key {
        "debounce.delay_ms" => config.debounce.delay_ms.to_string(),
        "debounce.scheduler" => config.debounce.scheduler.to_string(),
        "keyed.separator" => config.keyed.separator.clone(),
        "keyed.purge_idle" => config.keyed.purge_idle.to_string(),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'settle config list' to see available keys.",
            key
        ),
    };

    println!("{}", value);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = system_config::load()?;

    match key {
        "debounce.delay_ms" => {
            let val: i64 = value.parse()
                .context("Invalid value: must be an integer number of milliseconds")?;
            config.debounce.delay_ms = val;
        }
        "debounce.scheduler" => {
            config.debounce.scheduler = value.parse()?;
        }
        "keyed.separator" => {
            config.keyed.separator = value.to_string();
        }
        "keyed.purge_idle" => {
            let val: bool = value.parse()
                .context("Invalid value: must be 'true' or 'false'")?;
            config.keyed.purge_idle = val;
        }
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'settle config list' to see available keys.",
            key
        ),
    }

    // Validate before saving
    config.validate()
        .context("Invalid configuration value")?;

    system_config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);

    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    if create && !config_path.exists() {
        system_config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    let example = system_config::example_config();
    println!("{}", example);
    Ok(())
}
