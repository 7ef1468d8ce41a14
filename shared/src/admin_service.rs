use crate::http::{boxed_body, json_response, make_error_response};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

#[derive(Serialize)]
struct ReadinessBody {
    ready: bool,
    missing: Vec<String>,
}

/// Health and readiness probes served on the admin listener.
///
/// `missing` reports the components that are not configured yet. The service
/// is ready once that list is empty.
pub struct AdminService<F, E> {
    missing: F,
    _error: PhantomData<E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> Vec<String>,
{
    pub fn new(missing: F) -> Self {
        Self {
            missing,
            _error: PhantomData,
        }
    }

    pub fn respond(&self, path: &str) -> Response<Bytes> {
        match path {
            "/health" => Response::new(Bytes::from("ok\n")),
            "/ready" => {
                let missing = (self.missing)();
                let status = if missing.is_empty() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                json_response(
                    status,
                    &ReadinessBody {
                        ready: missing.is_empty(),
                        missing,
                    },
                )
            }
            _ => make_error_response(StatusCode::NOT_FOUND),
        }
    }
}

impl<F, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> Vec<String> + Send + Sync + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let response = self.respond(req.uri().path());
        Box::pin(async move { Ok(response.map(boxed_body)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_is_always_ok() {
        let admin: AdminService<_, std::io::Error> = AdminService::new(|| vec!["x".to_string()]);
        let response = admin.respond("/health");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"ok\n");
    }

    #[test]
    fn test_ready_reports_missing_components() {
        let admin: AdminService<_, std::io::Error> =
            AdminService::new(|| vec!["partner:opravo".to_string()]);
        let response = admin.respond("/ready");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["ready"], false);
        assert_eq!(body["missing"][0], "partner:opravo");

        let admin: AdminService<_, std::io::Error> = AdminService::new(Vec::new);
        assert_eq!(admin.respond("/ready").status(), StatusCode::OK);
        assert_eq!(admin.respond("/nope").status(), StatusCode::NOT_FOUND);
    }
}
