mod config;
mod telemetry;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(about = "Partner integration gateway and status monitor")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the status, connection and relay functions
    Gateway(CliArgs),
    /// Poll a status route and log connectivity changes
    Monitor(CliArgs),
}

#[derive(Args)]
struct CliArgs {
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error("invalid environment override: {0}")]
    Env(#[from] gateway::config::ValidationError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Gateway(#[from] gateway::errors::GatewayError),
    #[error(transparent)]
    Monitor(#[from] monitor::MonitorError),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("bridge failed: {e}");
        process::exit(1);
    }
}

fn run(command: CliCommand) -> Result<(), BridgeError> {
    match command {
        CliCommand::Gateway(args) => {
            let config = Config::from_file(&args.config)?;
            let mut gateway_config = config
                .gateway
                .ok_or(ConfigError::MissingSection("gateway"))?;
            gateway_config.apply_env(|key| std::env::var(key).ok())?;

            let _telemetry = telemetry::init(&config.common, gateway::metrics_defs::ALL_METRICS)?;
            tracing::info!("Starting gateway");
            runtime()?.block_on(gateway::run(gateway_config))?;
        }
        CliCommand::Monitor(args) => {
            let config = Config::from_file(&args.config)?;
            let monitor_config = config
                .monitor
                .ok_or(ConfigError::MissingSection("monitor"))?;

            let _telemetry = telemetry::init(&config.common, monitor::metrics_defs::ALL_METRICS)?;
            tracing::info!(url = %monitor_config.url, "Starting status monitor");
            runtime()?.block_on(monitor::run(monitor_config))?;
        }
    }
    Ok(())
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
