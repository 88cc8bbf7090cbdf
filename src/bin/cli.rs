// src/bin/cli.rs

//! Announcer CLI
//!
//! Polls the Blackboard alerts stream and relays new announcements to Discord.

use std::path::PathBuf;

use announcer::{error::Result, models::Config, pipeline};
use clap::{Parser, Subcommand};

/// Announcer - Blackboard to Discord announcement relay
#[derive(Parser, Debug)]
#[command(name = "announcer", version, about = "Blackboard announcement relay")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the stream on the configured interval
    Run {
        /// Log announcements instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single poll cycle and exit
    Once {
        /// Log announcements instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration file
    Validate,

    /// List the announcements contained in a saved stream payload
    Parse {
        /// Path to a `loadStream` JSON response
        file: PathBuf,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the configuration file, apply environment overrides and validate.
fn load_config(cli: &Cli, notify: bool) -> Result<Config> {
    let mut config = Config::load(&cli.config)?;
    config.apply_env_overrides();
    config.validate(notify)?;

    log::info!("Loaded configuration from {}", cli.config.display());
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Run { dry_run } => {
            let config = load_config(&cli, !dry_run)?;
            pipeline::run_poller(&config, *dry_run).await?;
        }

        Command::Once { dry_run } => {
            let config = load_config(&cli, !dry_run)?;
            let delivered = pipeline::run_once(&config, *dry_run).await?;
            log::info!("Delivered {} announcements", delivered);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = load_config(&cli, true) {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Parse { file } => {
            let announcements = pipeline::run_parse(file).await?;
            for a in &announcements {
                println!("{}", serde_json::to_string_pretty(a)?);
            }
        }
    }

    Ok(())
}
