use crate::probe::{DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{0} cannot be 0")]
    Zero(&'static str),
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

/// Status monitor configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Status route to poll, e.g. `https://host/functions/v1/sofinity-opravo-status`
    pub url: Url,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_ms == 0 {
            return Err(ValidationError::Zero("interval_ms"));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::Zero("timeout_ms"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
