use crate::config::{CommonConfig, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::{MetricDef, describe_all};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "bridge";

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("could not build statsd exporter: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
}

/// Keeps the Sentry client alive; events are flushed when it is dropped.
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Installs logging, error reporting and the metrics exporter.
pub fn init(common: &CommonConfig, metrics: &[MetricDef]) -> Result<TelemetryGuard, TelemetryError> {
    let sentry = common
        .logging
        .as_ref()
        .and_then(|logging| logging.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    tracing_subscriber::registry()
        .with(env_filter(common.logging.as_ref()))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry.is_some().then(sentry::integrations::tracing::layer))
        .init();

    if let Some(config) = &common.metrics {
        install_statsd(config)?;
        describe_all(metrics);
        tracing::info!(
            host = %config.statsd_host,
            port = config.statsd_port,
            "metrics exported to statsd"
        );
    }

    Ok(TelemetryGuard { _sentry: sentry })
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(logging: Option<&LoggingConfig>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = logging.map_or("info", |logging| logging.level.as_str());
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn install_statsd(config: &MetricsConfig) -> Result<(), TelemetryError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))?;
    metrics::set_global_recorder(recorder).map_err(|_| TelemetryError::RecorderInstalled)
}
