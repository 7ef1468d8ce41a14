use crate::config::Config;
use crate::connection::ConnectionEndpoint;
use crate::diagnostics::DiagnosticsEndpoint;
use crate::endpoint::Endpoint;
use crate::errors::EndpointError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::relay::{RelayEndpoint, RelayEvent, WebhookRelay};
use crate::status::{PartnerProbe, StatusEndpoint};
use backend::Backend;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use shared::http::{apply_cors, preflight_response};
use shared::{gauge, histogram};
use std::sync::Arc;
use std::time::Instant;

/// Hosted functions are usually mounted under this prefix. Both forms route.
const FUNCTIONS_PREFIX: &str = "/functions/v1";

/// Dispatches requests to endpoints by route name (`/<name>`).
#[derive(Clone)]
pub struct Router {
    endpoints: Arc<Vec<Arc<dyn Endpoint>>>,
}

impl Router {
    pub fn new(endpoints: Vec<Arc<dyn Endpoint>>) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
        }
    }

    /// Builds every function route from configuration. Endpoints whose
    /// settings are missing are still mounted and answer with a 500.
    pub fn from_config(config: &Config, backend: Arc<dyn Backend>) -> Self {
        let client = reqwest::Client::new();
        let probe = |partner: &'static str| {
            PartnerProbe::new(partner, config.partner(partner), client.clone())
        };

        let endpoints: Vec<Arc<dyn Endpoint>> = vec![
            Arc::new(StatusEndpoint::new(
                "sofinity-opravo-status",
                probe("sofinity"),
            )),
            Arc::new(StatusEndpoint::new("opravo-status", probe("opravo"))),
            Arc::new(DiagnosticsEndpoint::new(
                "opravo-diagnostics",
                probe("opravo"),
            )),
            Arc::new(ConnectionEndpoint::by_name(
                "connect-sofinity",
                "Opravo",
                "Opravo integration",
                backend.clone(),
            )),
            Arc::new(ConnectionEndpoint::by_id(
                "connect-opravo-sofinity",
                backend.clone(),
            )),
            Arc::new(RelayEndpoint::new(
                "on-project-connection",
                RelayEvent::ProjectConnection,
                WebhookRelay::new(
                    "project_connection",
                    config.relays.project_connection.clone(),
                    "project_connection_webhook",
                    client.clone(),
                ),
                backend.clone(),
            )),
            Arc::new(RelayEndpoint::new(
                "send-to-onemill",
                RelayEvent::OneMil,
                WebhookRelay::new(
                    "onemil",
                    config.relays.onemil.clone(),
                    "onemil_webhook",
                    client.clone(),
                ),
                backend,
            )),
        ];

        Self::new(endpoints)
    }

    fn find(&self, path: &str) -> Option<&Arc<dyn Endpoint>> {
        let path = match path.strip_prefix(FUNCTIONS_PREFIX) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        };
        let name = path.trim_start_matches('/').trim_end_matches('/');
        self.endpoints.iter().find(|e| e.name() == name)
    }

    pub async fn route(&self, request: Request<Bytes>) -> Response<Bytes> {
        let started = Instant::now();
        let Some(endpoint) = self.find(request.uri().path()) else {
            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                "No route matched"
            );
            let mut response = EndpointError::UnknownRoute.into_response();
            apply_cors(response.headers_mut());
            return response;
        };
        let handler = endpoint.name();

        gauge!(REQUESTS_INFLIGHT).increment(1.0);

        let mut response = if request.method() == Method::OPTIONS {
            preflight_response()
        } else if request.method() != endpoint.method() {
            EndpointError::MethodNotAllowed.into_response()
        } else {
            endpoint.handle(request).await
        };
        apply_cors(response.headers_mut());

        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
        histogram!(
            REQUEST_DURATION,
            "status" => response.status().as_str().to_string(),
            "handler" => handler
        )
        .record(started.elapsed().as_secs_f64());

        response
    }
}
