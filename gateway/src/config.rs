use backend::config::BackendConfig;
use http::HeaderName;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Partners with a status route. Their settings can come from the environment
/// even when the config file has no entry for them.
pub const KNOWN_PARTNERS: &[&str] = &["sofinity", "opravo"];

const DEFAULT_STATUS_PATH: &str = "/api/status";
const DEFAULT_API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_STATUS_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_SECRET_HEADER: &str = "x-webhook-secret";
const DEFAULT_RELAY_TIMEOUT_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Timeout for {0} cannot be 0")]
    ZeroTimeout(String),

    #[error("Invalid header name for {0}: {1}")]
    InvalidHeaderName(String, String),

    #[error("Invalid URL in {0}: {1}")]
    InvalidUrl(String, url::ParseError),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the function routes
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Partner status APIs keyed by partner name
    #[serde(default)]
    pub partners: HashMap<String, PartnerConfig>,
    #[serde(default)]
    pub relays: RelaysConfig,
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.backend.timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout("backend".into()));
        }

        for (name, partner) in &self.partners {
            if partner.timeout_ms == 0 {
                return Err(ValidationError::ZeroTimeout(format!("partner {name}")));
            }
            validate_header(&partner.api_key_header, &format!("partner {name}"))?;
        }

        for (name, relay) in self.relays.iter() {
            if relay.timeout_ms == 0 {
                return Err(ValidationError::ZeroTimeout(format!("relay {name}")));
            }
            validate_header(&relay.secret_header, &format!("relay {name}"))?;
        }

        Ok(())
    }

    /// Overlays settings taken from the environment. `lookup` is
    /// `std::env::var(..).ok()` in production.
    ///
    /// - `BACKEND_URL`, `BACKEND_SERVICE_KEY`
    /// - `<PARTNER>_API_URL`, `<PARTNER>_API_KEY`
    /// - `<RELAY>_WEBHOOK_URL`, `<RELAY>_WEBHOOK_SECRET`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BACKEND_URL") {
            self.backend.url = Some(parse_url("BACKEND_URL", &url)?);
        }
        if let Some(key) = lookup("BACKEND_SERVICE_KEY") {
            self.backend.service_key = Some(key);
        }

        let mut names: Vec<String> = KNOWN_PARTNERS.iter().map(|p| p.to_string()).collect();
        for name in self.partners.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        for name in names {
            let prefix = name.to_uppercase();
            let url_var = format!("{prefix}_API_URL");
            let url = lookup(&url_var)
                .map(|u| parse_url(&url_var, &u))
                .transpose()?;
            let key = lookup(&format!("{prefix}_API_KEY"));

            if url.is_none() && key.is_none() {
                continue;
            }

            let partner = self.partners.entry(name).or_default();
            if url.is_some() {
                partner.base_url = url;
            }
            if key.is_some() {
                partner.api_key = key;
            }
        }

        for (name, relay) in self.relays.iter_mut() {
            let prefix = name.to_uppercase();
            let url_var = format!("{prefix}_WEBHOOK_URL");
            if let Some(url) = lookup(&url_var) {
                relay.url = Some(parse_url(&url_var, &url)?);
            }
            if let Some(secret) = lookup(&format!("{prefix}_WEBHOOK_SECRET")) {
                relay.secret = Some(secret);
            }
        }

        Ok(())
    }

    /// Settings for a partner, or an empty entry that every check will
    /// report as unconfigured.
    pub fn partner(&self, name: &str) -> PartnerConfig {
        self.partners.get(name).cloned().unwrap_or_default()
    }

    /// Components whose required settings are absent. Drives `/ready`.
    pub fn missing_components(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if !self.backend.is_configured() {
            missing.push("backend".to_string());
        }

        for name in KNOWN_PARTNERS {
            if !self.partner(name).is_configured() {
                missing.push(format!("partner:{name}"));
            }
        }

        for (name, relay) in self.relays.iter() {
            if !relay.is_configured() {
                missing.push(format!("relay:{name}"));
            }
        }

        missing
    }
}

fn parse_url(source: &str, value: &str) -> Result<Url, ValidationError> {
    Url::parse(value).map_err(|e| ValidationError::InvalidUrl(source.to_string(), e))
}

fn validate_header(name: &str, owner: &str) -> Result<(), ValidationError> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidHeaderName(owner.to_string(), e.to_string()))
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_status_path() -> String {
    DEFAULT_STATUS_PATH.to_string()
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_status_timeout_ms() -> u64 {
    DEFAULT_STATUS_TIMEOUT_MS
}

/// A partner API that exposes a status route.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PartnerConfig {
    pub base_url: Option<Url>,
    /// Server-held credential. Never returned to callers.
    pub api_key: Option<String>,
    #[serde(default = "default_status_path")]
    pub status_path: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_status_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        PartnerConfig {
            base_url: None,
            api_key: None,
            status_path: default_status_path(),
            api_key_header: default_api_key_header(),
            timeout_ms: DEFAULT_STATUS_TIMEOUT_MS,
        }
    }
}

impl PartnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    /// `<base_url><status_path>`, tolerant of slashes on either side.
    pub fn status_url(&self) -> Option<String> {
        self.base_url.as_ref().map(|base| {
            format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                self.status_path.trim_start_matches('/')
            )
        })
    }
}

fn default_secret_header() -> String {
    DEFAULT_SECRET_HEADER.to_string()
}

fn default_relay_timeout_ms() -> u64 {
    DEFAULT_RELAY_TIMEOUT_MS
}

/// One outbound webhook.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RelayTarget {
    pub url: Option<Url>,
    pub secret: Option<String>,
    #[serde(default = "default_secret_header")]
    pub secret_header: String,
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
    /// `type` written to `error_logs` when delivery fails. Each relay has its
    /// own default.
    #[serde(default)]
    pub error_log_type: Option<String>,
}

impl Default for RelayTarget {
    fn default() -> Self {
        RelayTarget {
            url: None,
            secret: None,
            secret_header: default_secret_header(),
            timeout_ms: DEFAULT_RELAY_TIMEOUT_MS,
            error_log_type: None,
        }
    }
}

impl RelayTarget {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.secret.is_some()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RelaysConfig {
    #[serde(default)]
    pub project_connection: RelayTarget,
    #[serde(default)]
    pub onemil: RelayTarget,
}

impl RelaysConfig {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &RelayTarget)> {
        [
            ("project_connection", &self.project_connection),
            ("onemil", &self.onemil),
        ]
        .into_iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut RelayTarget)> {
        [
            ("project_connection", &mut self.project_connection),
            ("onemil", &mut self.onemil),
        ]
        .into_iter()
    }
}
