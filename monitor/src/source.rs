use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("status endpoint did not respond within {0} ms")]
    Timeout(u64),

    #[error("status endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status endpoint responded with {0}")]
    Status(reqwest::StatusCode),

    #[error("status endpoint returned an invalid body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Where the probe reads the integration status from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetches the status document. A non-success reply is an error.
    async fn fetch(&self) -> Result<Value, ProbeError>;
}

/// Reads the status from a gateway status route over HTTP.
pub struct HttpStatusSource {
    url: Url,
    client: reqwest::Client,
}

impl HttpStatusSource {
    pub fn new(url: Url, client: reqwest::Client) -> Self {
        Self { url, client }
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<Value, ProbeError> {
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
