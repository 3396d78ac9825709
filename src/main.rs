//! digits-api server binary.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use log::info;

use digits_api::acquire;
use digits_api::config::{ConfigError, ServiceConfig};
use digits_api::logging;
use digits_api::server::{self, AppState};

/// Digit classification API backed by the best run of an MLflow experiment.
#[derive(Parser, Debug)]
#[command(name = "digits-api", version, about)]
struct Cli {
    /// Listen address [env: DIGITS_API_ADDR, default: 0.0.0.0:8000].
    #[arg(short, long)]
    addr: Option<SocketAddr>,

    /// Log level: off, error, warn, info, debug or trace [env: DIGITS_API_LOG].
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidLogLevel(level))?;
    }

    logging::init(config.log_level);
    info!("digits-api v{}", env!("CARGO_PKG_VERSION"));

    let handle = acquire::initialize(&config).await;
    server::serve(config.addr, AppState::new(handle.clone())).await?;
    acquire::teardown(&handle);

    Ok(())
}
