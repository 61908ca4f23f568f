//! pushcall - VoIP push-to-telephony bridge
//!
//! Normalizes incoming-call push payloads, drives the call through its
//! lifecycle and keeps the device audio session in step with it.

mod calling;
mod config;
mod console;
mod push;
mod registrar;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use calling::identity::IdPolicy;
use calling::lifecycle::BusyPolicy;
use config::Config;

#[derive(Parser)]
#[command(name = "pushcall")]
#[command(about = "VoIP push-to-telephony bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON events from stdin and drive calls through the bridge
    Run {
        /// Override the push completion delay (milliseconds)
        #[arg(long)]
        completion_delay_ms: Option<u64>,

        /// Override what happens to a second call while one is live
        #[arg(long, value_enum)]
        busy_policy: Option<BusyPolicyArg>,
    },

    /// Normalize a push payload file and print the resulting call record
    Normalize {
        /// JSON file holding the push dictionary
        file: PathBuf,

        /// Require the call identifier to be a UUID
        #[arg(long)]
        strict: bool,
    },

    /// Show the configuration file location and effective values
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Command-line spelling of [`BusyPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum BusyPolicyArg {
    Reject,
    Replace,
}

impl From<BusyPolicyArg> for BusyPolicy {
    fn from(arg: BusyPolicyArg) -> Self {
        match arg {
            BusyPolicyArg::Reject => BusyPolicy::Reject,
            BusyPolicyArg::Replace => BusyPolicy::Replace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Run {
            completion_delay_ms,
            busy_policy,
        } => {
            let mut config = Config::load().context("Failed to load config")?;
            if let Some(ms) = completion_delay_ms {
                config.completion_delay_ms = ms;
            }
            if let Some(policy) = busy_policy {
                config.busy_policy = policy.into();
            }
            console::run(config).await?;
        }
        Commands::Normalize { file, strict } => {
            normalize_file(&file, strict)?;
        }
        Commands::Config { init } => {
            let config = Config::load().context("Failed to load config")?;
            println!("Config file: {}", Config::config_path()?.display());
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
            if init {
                config.save()?;
                println!("Saved.");
            }
        }
    }

    Ok(())
}

fn normalize_file(file: &Path, strict: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let payload: push::Payload =
        serde_json::from_str(&text).context("Payload must be a JSON object")?;

    match push::normalize_push(&payload, IdPolicy::from_strict(strict))? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No metadata: push would be ignored"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_policy_flag_maps_to_controller_policy() {
        let cli = Cli::try_parse_from(["pushcall", "run", "--busy-policy", "replace"]).unwrap();
        match cli.command {
            Commands::Run { busy_policy, .. } => {
                assert_eq!(busy_policy.map(BusyPolicy::from), Some(BusyPolicy::Replace));
            }
            _ => panic!("expected run"),
        }
        assert!(Cli::try_parse_from(["pushcall", "run", "--busy-policy", "queue"]).is_err());
    }
}
