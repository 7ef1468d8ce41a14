use crate::endpoint::Endpoint;
use crate::status::{PartnerProbe, StatusBody};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Method;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use shared::http::json_response;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Checks {
    api_url_configured: bool,
    api_key_configured: bool,
}

#[derive(Serialize)]
struct DiagnosticsBody {
    partner: &'static str,
    checks: Checks,
    status: Option<StatusBody>,
    timestamp: DateTime<Utc>,
}

/// Reports which partner settings are present and, when they all are, the
/// result of one live status check. Secret values are never echoed.
pub struct DiagnosticsEndpoint {
    name: &'static str,
    probe: PartnerProbe,
}

impl DiagnosticsEndpoint {
    pub fn new(name: &'static str, probe: PartnerProbe) -> Self {
        Self { name, probe }
    }
}

#[async_trait]
impl Endpoint for DiagnosticsEndpoint {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> Method {
        Method::GET
    }

    async fn handle(&self, _request: Request<Bytes>) -> Response<Bytes> {
        let config = self.probe.config();
        let checks = Checks {
            api_url_configured: config.base_url.is_some(),
            api_key_configured: config.api_key.is_some(),
        };

        let status = if config.is_configured() {
            self.probe.check().await.ok()
        } else {
            None
        };

        json_response(
            StatusCode::OK,
            &DiagnosticsBody {
                partner: self.probe.partner(),
                checks,
                status,
                timestamp: Utc::now(),
            },
        )
    }
}
