//! Persistence and session collaborator.
//!
//! The managed backend owns authentication and the relational tables. This
//! crate only exposes the handful of operations the gateway needs, behind the
//! [`Backend`] trait, with a REST implementation for production and an
//! in-memory one for tests.
pub mod config;
pub mod memory;
pub mod rest;
pub mod types;

use async_trait::async_trait;
use config::BackendConfig;
use std::sync::Arc;
use types::{ErrorLogEntry, NewProject, NotificationRecord, Project, ProjectLink, UserId};

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("backend is not configured: {0} missing")]
    NotConfigured(&'static str),
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("backend responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("backend returned no rows from {0}")]
    EmptyResult(&'static str),
    #[error("write to {table} rejected: {reason}")]
    Rejected { table: &'static str, reason: String },
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Resolves a user access token to its user id. `None` means the session
    /// is missing, expired or otherwise invalid.
    async fn authenticate(&self, access_token: &str) -> Result<Option<UserId>, BackendError>;

    async fn find_project_by_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Project>, BackendError>;

    /// Existence and ownership are checked in a single lookup: a project owned
    /// by someone else is reported exactly like a missing one.
    async fn find_owned_project(
        &self,
        owner: &str,
        project_id: &str,
    ) -> Result<Option<Project>, BackendError>;

    async fn insert_project(&self, project: NewProject) -> Result<Project, BackendError>;

    async fn update_project_link(
        &self,
        project_id: &str,
        link: ProjectLink,
    ) -> Result<Project, BackendError>;

    async fn insert_error_log(&self, entry: ErrorLogEntry) -> Result<(), BackendError>;

    async fn insert_notification(
        &self,
        notification: NotificationRecord,
    ) -> Result<(), BackendError>;
}

/// Returns the backend described by the configuration. Without a URL or
/// service key every call fails with [`BackendError::NotConfigured`], so only
/// the endpoints that need persistence are affected.
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
    match (&config.url, &config.service_key) {
        (Some(url), Some(key)) => Ok(Arc::new(rest::RestBackend::new(
            url.clone(),
            key.clone(),
            config.timeout(),
        )?)),
        (None, _) => {
            tracing::warn!("backend URL is not configured");
            Ok(Arc::new(UnconfiguredBackend("url")))
        }
        (_, None) => {
            tracing::warn!("backend service key is not configured");
            Ok(Arc::new(UnconfiguredBackend("service_key")))
        }
    }
}

struct UnconfiguredBackend(&'static str);

#[async_trait]
impl Backend for UnconfiguredBackend {
    async fn authenticate(&self, _access_token: &str) -> Result<Option<UserId>, BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }

    async fn find_project_by_name(
        &self,
        _owner: &str,
        _name: &str,
    ) -> Result<Option<Project>, BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }

    async fn find_owned_project(
        &self,
        _owner: &str,
        _project_id: &str,
    ) -> Result<Option<Project>, BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }

    async fn insert_project(&self, _project: NewProject) -> Result<Project, BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }

    async fn update_project_link(
        &self,
        _project_id: &str,
        _link: ProjectLink,
    ) -> Result<Project, BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }

    async fn insert_error_log(&self, _entry: ErrorLogEntry) -> Result<(), BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }

    async fn insert_notification(
        &self,
        _notification: NotificationRecord,
    ) -> Result<(), BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }
}
