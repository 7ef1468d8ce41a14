//! Webhook relays.
//!
//! An inbound event is validated, then forwarded once to a configured webhook
//! with a shared secret header. The caller always gets a well-formed answer:
//! a failed delivery is reported as `success: false` and recorded in
//! `error_logs`. There is no retry and no queue.
use crate::config::RelayTarget;
use crate::endpoint::{Endpoint, parse_json_body, required_str};
use crate::errors::EndpointError;
use crate::metrics_defs::RELAY_DELIVERIES;
use crate::side_effects;
use async_trait::async_trait;
use backend::Backend;
use backend::types::{ErrorDetail, ErrorLogEntry, NotificationRecord};
use http::Method;
use http::header::CONTENT_TYPE;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use shared::counter;
use shared::http::json_response;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;
use url::Url;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("webhook did not respond within {0} ms")]
    Timeout(u64),

    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("webhook responded with {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl RelayError {
    fn kind(&self) -> &'static str {
        match self {
            RelayError::Timeout(_) => "TimeoutError",
            RelayError::Transport(_) => "TransportError",
            RelayError::Rejected { .. } => "WebhookRejected",
        }
    }
}

/// One configured outbound webhook.
pub struct WebhookRelay {
    relay: &'static str,
    target: RelayTarget,
    default_log_type: &'static str,
    client: reqwest::Client,
}

impl WebhookRelay {
    pub fn new(
        relay: &'static str,
        target: RelayTarget,
        default_log_type: &'static str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            relay,
            target,
            default_log_type,
            client,
        }
    }

    /// `type` tag for `error_logs` rows written by this relay.
    pub fn log_type(&self) -> &str {
        self.target
            .error_log_type
            .as_deref()
            .unwrap_or(self.default_log_type)
    }

    /// URL and secret, or the configuration error naming what is missing.
    fn destination(&self) -> Result<(&Url, &str), EndpointError> {
        let upper = self.relay.to_uppercase();
        let url = self.target.url.as_ref().ok_or_else(|| {
            EndpointError::Config(format!("{upper}_WEBHOOK_URL is not configured"))
        })?;
        let secret = self.target.secret.as_deref().ok_or_else(|| {
            EndpointError::Config(format!("{upper}_WEBHOOK_SECRET is not configured"))
        })?;
        Ok((url, secret))
    }

    /// Posts `body` to the webhook. Returns the upstream status on 2xx.
    async fn forward(&self, url: &Url, secret: &str, body: Bytes) -> Result<u16, RelayError> {
        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(self.target.secret_header.as_str(), secret)
            .body(body)
            .send();

        // The body of a rejection is read under the same deadline as the
        // headers.
        timeout(self.target.timeout(), async {
            let response = request.await.map_err(RelayError::Transport)?;
            let status = response.status();
            if status.is_success() {
                return Ok(status.as_u16());
            }

            let body = response.text().await.unwrap_or_default();
            Err(RelayError::Rejected {
                status: status.as_u16(),
                body,
            })
        })
        .await
        .map_err(|_| RelayError::Timeout(self.target.timeout_ms))?
    }
}

/// Event-specific part of a relay route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    /// Database change on `projects`. The owner gets a notification after
    /// every attempt.
    ProjectConnection,
    /// Message handed over to the 1MIL inbox.
    OneMil,
}

impl RelayEvent {
    /// Checks the required fields. Returns the notification to write after
    /// the relay attempt, if this event has one.
    fn validate(&self, payload: &Value) -> Result<Option<NotificationRecord>, EndpointError> {
        match self {
            RelayEvent::ProjectConnection => {
                required_str(payload, "/record/id", "record.id")?;
                let owner = required_str(payload, "/record/user_id", "record.user_id")?;
                Ok(Some(connection_notice(payload, owner)))
            }
            RelayEvent::OneMil => {
                required_str(payload, "/user_id", "user_id")?;
                required_str(payload, "/content", "content")?;
                required_str(payload, "/sender", "sender")?;
                Ok(None)
            }
        }
    }
}

fn connection_notice(payload: &Value, owner: String) -> NotificationRecord {
    let name = payload
        .pointer("/record/name")
        .and_then(Value::as_str)
        .unwrap_or("Project");
    let link = payload
        .pointer("/record/external_connection")
        .and_then(Value::as_str)
        .filter(|link| !link.is_empty());

    let (title, message) = match link {
        Some(link) => (
            "Project connected",
            format!("\"{name}\" is now connected to {link}"),
        ),
        None => (
            "Project disconnected",
            format!("\"{name}\" is no longer connected to an external system"),
        ),
    };

    NotificationRecord {
        user_id: owner,
        title: title.to_string(),
        message,
        kind: "integration".to_string(),
    }
}

#[derive(Serialize)]
struct RelayBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub struct RelayEndpoint {
    name: &'static str,
    event: RelayEvent,
    relay: WebhookRelay,
    backend: Arc<dyn Backend>,
}

impl RelayEndpoint {
    pub fn new(
        name: &'static str,
        event: RelayEvent,
        relay: WebhookRelay,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            name,
            event,
            relay,
            backend,
        }
    }

    async fn relay(&self, body: Bytes) -> Result<RelayBody, EndpointError> {
        let payload = parse_json_body(&body)?;
        let notice = self.event.validate(&payload)?;
        let (url, secret) = self.relay.destination()?;

        let outcome = self.relay.forward(url, secret, body).await;

        let reply = match outcome {
            Ok(status) => {
                counter!(RELAY_DELIVERIES, "relay" => self.relay.relay, "outcome" => "delivered")
                    .increment(1);
                tracing::info!(endpoint = self.name, status, "event relayed");
                RelayBody {
                    success: true,
                    status: Some(status),
                    error: None,
                }
            }
            Err(e) => {
                counter!(RELAY_DELIVERIES, "relay" => self.relay.relay, "outcome" => "failed")
                    .increment(1);
                tracing::error!(endpoint = self.name, error = %e, "event relay failed");

                let entry = ErrorLogEntry {
                    kind: self.relay.log_type().to_string(),
                    payload: payload.clone(),
                    error: ErrorDetail::capture(e.kind(), &e),
                };
                side_effects::attempt("error_log", self.backend.insert_error_log(entry)).await;

                RelayBody {
                    success: false,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        };

        if let Some(notice) = notice {
            side_effects::attempt("notification", self.backend.insert_notification(notice))
                .await;
        }

        Ok(reply)
    }
}

#[async_trait]
impl Endpoint for RelayEndpoint {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> Method {
        Method::POST
    }

    async fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        match self.relay(request.into_body()).await {
            Ok(body) => json_response(StatusCode::OK, &body),
            Err(e) => {
                if let EndpointError::Config(_) = e {
                    tracing::error!(endpoint = self.name, error = %e, "relay not configured");
                }
                e.into_response()
            }
        }
    }
}
