pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod endpoint;
pub mod errors;
pub mod metrics_defs;
pub mod relay;
pub mod router;
pub mod side_effects;
pub mod status;
#[cfg(test)]
mod testutils;

use crate::errors::GatewayError;
use crate::router::Router;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use shared::admin_service::AdminService;
use shared::http::{boxed_body, make_error_response, run_http_service};
use std::pin::Pin;

pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    config.validate()?;

    let backend = backend::from_config(&config.backend)?;
    let missing = config.missing_components();
    if !missing.is_empty() {
        tracing::warn!(?missing, "starting with unconfigured components");
    }

    let gateway_service = GatewayService::new(Router::from_config(&config, backend));
    let admin_service = AdminService::<_, GatewayError>::new(move || missing.clone());

    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        gateway_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}

/// Buffers the request body and hands the request to the router.
pub struct GatewayService {
    router: Router,
}

impl GatewayService {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let router = self.router.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read request body");
                    return Ok(make_error_response(StatusCode::BAD_REQUEST).map(boxed_body));
                }
            };

            let response = router.route(Request::from_parts(parts, body)).await;
            Ok(response.map(boxed_body))
        })
    }
}
