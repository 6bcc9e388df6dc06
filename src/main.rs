//! Triad CLI entry point.

use clap::Parser;

use triad::cli::{handle_error, Cli};
use triad::infrastructure::config::ConfigLoader;
use triad::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A broken config is reported by the command itself; log with defaults meanwhile.
    let log_config = ConfigLoader::load()
        .ok()
        .and_then(|config| LogConfig::try_from(&config.logging).ok())
        .unwrap_or_default();
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    if let Err(err) = cli.command.execute(cli.json).await {
        handle_error(err, cli.json);
    }
}
