pub mod config;
pub mod metrics_defs;
pub mod probe;
pub mod source;

use crate::probe::StatusProbe;
use crate::source::HttpStatusSource;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ValidationError),
}

/// Polls the configured status route until the process is interrupted,
/// logging every transition between connected and disconnected.
pub async fn run(config: config::Config) -> Result<(), MonitorError> {
    config.validate()?;

    let source = HttpStatusSource::new(config.url.clone(), reqwest::Client::new());
    let probe = StatusProbe::with_schedule(Arc::new(source), config.interval(), config.timeout());

    let url = config.url.to_string();
    let last = parking_lot::Mutex::new(None::<bool>);
    probe.start_monitoring(move |status| {
        let previous = last.lock().replace(status.is_connected);
        if previous == Some(status.is_connected) {
            tracing::debug!(url, connected = status.is_connected, "status unchanged");
        } else if status.is_connected {
            tracing::info!(url, "integration connected");
        } else {
            tracing::warn!(url, error = ?status.error, "integration disconnected");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down status monitor");
    probe.stop_monitoring();
    Ok(())
}
