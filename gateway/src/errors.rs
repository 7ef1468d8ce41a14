use backend::BackendError;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use shared::http::json_response;
use thiserror::Error;

/// Errors that stop the gateway from serving at all
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ValidationError),

    #[error("backend setup failed: {0}")]
    Backend(#[from] BackendError),
}

/// Errors a single function call can end in. Each maps to one HTTP status.
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Project not found")]
    NotFound,

    #[error("Not found")]
    UnknownRoute,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Config(String),

    #[error("Database error")]
    Persistence(#[source] BackendError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl EndpointError {
    pub fn status(&self) -> StatusCode {
        match self {
            EndpointError::Validation(_) => StatusCode::BAD_REQUEST,
            EndpointError::Unauthorized => StatusCode::UNAUTHORIZED,
            EndpointError::NotFound | EndpointError::UnknownRoute => StatusCode::NOT_FOUND,
            EndpointError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            EndpointError::Config(_) | EndpointError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn into_response(self) -> Response<Bytes> {
        let details = match &self {
            EndpointError::Persistence(e) => Some(e.to_string()),
            _ => None,
        };

        json_response(
            self.status(),
            &ErrorBody {
                error: self.to_string(),
                details,
            },
        )
    }
}

impl From<BackendError> for EndpointError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotConfigured(what) => {
                EndpointError::Config(format!("Backend {what} is not configured"))
            }
            other => EndpointError::Persistence(other),
        }
    }
}
