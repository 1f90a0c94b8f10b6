use anyhow::Result;
use clap::Parser;
use std::env;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use moderator_dialogs::cli::Cli;
use moderator_dialogs::Config;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[tokio::main]
async fn main() {
    // Set up panic hook for graceful error recovery
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        std::process::exit(1);
    }));

    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file found or error loading it: {}", e);
    }

    let cli = Cli::parse();

    let filter = match init_logging(cli.debug) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, &filter).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, filter: &FilterHandle) -> Result<()> {
    let config = cli.load_config().await?;
    apply_log_filter(filter, &config, cli.debug)?;
    cli.execute(config).await
}

/// Start logging before the configuration is read so problems loading it are
/// reported. RUST_LOG wins over MODDLG_LOG, which wins over the built-in filter.
fn init_logging(debug: bool) -> Result<FilterHandle> {
    let default_filter = if debug {
        "moderator_dialogs=debug".to_string()
    } else {
        env::var("MODDLG_LOG").unwrap_or_else(|_| Config::default().log_filter)
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let (filter_layer, handle) = reload::Layer::new(env_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(handle)
}

/// Switch to the configured filter unless RUST_LOG or --debug already chose one.
fn apply_log_filter(handle: &FilterHandle, config: &Config, debug: bool) -> Result<()> {
    if debug || env::var_os("RUST_LOG").is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", config.log_filter, e))?;
    handle
        .reload(filter)
        .map_err(|e| anyhow::anyhow!("Failed to apply log filter: {}", e))
}
