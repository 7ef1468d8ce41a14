//! Partner status proxy.
//!
//! Hides the partner credential from callers and normalizes whatever the
//! partner answers into one envelope. Upstream failures never change the HTTP
//! status of the reply: they show up as `isConnected: false` with `error` set.
use crate::config::PartnerConfig;
use crate::endpoint::Endpoint;
use crate::errors::EndpointError;
use crate::metrics_defs::PARTNER_CHECKS;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Method;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::counter;
use shared::http::json_response;
use std::collections::BTreeMap;
use tokio::time::{Instant, timeout};

/// Raw upstream reply, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON when the body is valid JSON, the raw text otherwise.
    pub body: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub is_connected: bool,
    pub last_checked: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds spent on the upstream call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
}

impl StatusBody {
    fn disconnected(error: String, duration: Option<u64>) -> Self {
        StatusBody {
            is_connected: false,
            last_checked: Utc::now(),
            error: Some(error),
            duration,
            api_response: None,
        }
    }
}

/// Calls one partner's status route.
#[derive(Clone)]
pub struct PartnerProbe {
    partner: &'static str,
    config: PartnerConfig,
    client: reqwest::Client,
}

impl PartnerProbe {
    pub fn new(partner: &'static str, config: PartnerConfig, client: reqwest::Client) -> Self {
        Self {
            partner,
            config,
            client,
        }
    }

    pub fn partner(&self) -> &'static str {
        self.partner
    }

    pub fn config(&self) -> &PartnerConfig {
        &self.config
    }

    /// Runs one check. Only missing configuration is an error; everything the
    /// upstream does wrong is folded into the returned body.
    pub async fn check(&self) -> Result<StatusBody, EndpointError> {
        let upper = self.partner.to_uppercase();
        let url = self
            .config
            .status_url()
            .ok_or_else(|| EndpointError::Config(format!("{upper}_API_URL is not configured")))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| EndpointError::Config(format!("{upper}_API_KEY is not configured")))?;

        let started = Instant::now();
        let request = self
            .client
            .get(&url)
            .header(self.config.api_key_header.as_str(), api_key)
            .send();

        let outcome = timeout(self.config.timeout(), async {
            let response = request.await?;
            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.to_string(), v.to_string()))
                })
                .collect::<BTreeMap<_, _>>();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, headers, text))
        })
        .await;
        let duration = started.elapsed().as_millis() as u64;

        let body = match outcome {
            Err(_elapsed) => StatusBody::disconnected(
                format!(
                    "{} API did not respond within {} ms",
                    self.partner, self.config.timeout_ms
                ),
                Some(duration),
            ),
            Ok(Err(e)) => StatusBody::disconnected(
                format!("{} API request failed: {e}", self.partner),
                Some(duration),
            ),
            Ok(Ok((status, headers, text))) => {
                self.normalize(status, headers, text, duration)
            }
        };

        let outcome = if body.is_connected {
            "connected"
        } else {
            "disconnected"
        };
        counter!(PARTNER_CHECKS, "partner" => self.partner, "outcome" => outcome).increment(1);
        tracing::debug!(
            partner = self.partner,
            connected = body.is_connected,
            duration_ms = duration,
            "partner status checked"
        );

        Ok(body)
    }

    fn normalize(
        &self,
        status: StatusCode,
        headers: BTreeMap<String, String>,
        text: String,
        duration: u64,
    ) -> StatusBody {
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        // Strict: only the JSON literal `true` counts.
        let reported = body.get("isConnected") == Some(&Value::Bool(true));
        let is_connected = status.is_success() && reported;

        let error = if !status.is_success() {
            Some(format!("{} API responded with {status}", self.partner))
        } else if !reported {
            Some(
                body.get("error")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| format!("{} API did not report a connection", self.partner)),
            )
        } else {
            None
        };

        StatusBody {
            is_connected,
            last_checked: Utc::now(),
            error,
            duration: Some(duration),
            api_response: Some(ApiResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body,
            }),
        }
    }
}

pub struct StatusEndpoint {
    name: &'static str,
    probe: PartnerProbe,
}

impl StatusEndpoint {
    pub fn new(name: &'static str, probe: PartnerProbe) -> Self {
        Self { name, probe }
    }
}

#[async_trait]
impl Endpoint for StatusEndpoint {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> Method {
        Method::GET
    }

    async fn handle(&self, _request: Request<Bytes>) -> Response<Bytes> {
        match self.probe.check().await {
            Ok(body) => json_response(StatusCode::OK, &body),
            Err(e) => {
                tracing::error!(endpoint = self.name, error = %e, "status check not possible");
                json_response(e.status(), &StatusBody::disconnected(e.to_string(), None))
            }
        }
    }
}
