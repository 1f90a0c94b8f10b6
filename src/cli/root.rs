use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use super::replay::ReplayCommand;
use crate::config::Config;
use crate::tui;

/// Modal dialog stack of the Moderator console
#[derive(Parser)]
#[command(
    name = "moderator-dialogs",
    version,
    about = "Modal dialog stack of the Moderator console",
    long_about = r#"Drives the Moderator dialog stack either interactively or from a script.

Examples:
  moderator-dialogs                         # Start the interactive view
  moderator-dialogs replay steps.json       # Replay a script of dialog operations
  moderator-dialogs --config dlg.json tui   # Use an explicit configuration file"#
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Configuration file to use instead of the default search path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a script of dialog operations non-interactively
    Replay(ReplayCommand),
    /// Start the interactive view
    Tui,
}

impl Cli {
    /// Configuration from `--config`, or from the default search path.
    pub async fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::from_sources(Some(Config::load_from_path(path).await?)),
            None => Config::init().await,
        }
    }

    pub async fn execute(self, config: Config) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }
        debug!("Configuration initialized");

        match self.command {
            Some(Commands::Replay(replay)) => replay.execute(&config).await,
            Some(Commands::Tui) | None => {
                info!("Starting interactive mode");
                tui::run(config).await?;
                info!("Application finished");
                Ok(())
            }
        }
    }
}
