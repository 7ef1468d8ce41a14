use serde::Deserialize;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Connection settings for the managed backend.
///
/// Both fields may be left out of the config file and supplied through the
/// environment instead (`BACKEND_URL`, `BACKEND_SERVICE_KEY`).
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub url: Option<Url>,
    pub service_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            url: None,
            service_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.service_key.is_some()
    }
}
