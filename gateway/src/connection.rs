//! Links a project record to the partner system for the calling user.
//!
//! Two lookups are supported. By fixed name, the record is created on the
//! first call and updated in place afterwards. By id, the record must already
//! exist and belong to the caller; anything else is a plain 404.
use crate::endpoint::{Endpoint, bearer_token, parse_json_body, required_str};
use crate::errors::EndpointError;
use crate::metrics_defs::PROJECT_CONNECTIONS;
use async_trait::async_trait;
use backend::Backend;
use backend::types::{NewProject, Project, ProjectLink, UserId};
use http::Method;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use shared::counter;
use shared::http::json_response;
use std::sync::Arc;

/// Value written to `external_connection` when a project is linked.
pub const PARTNER_LINK: &str = "sofinity";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
}

#[derive(Serialize)]
struct ConnectionBody {
    success: bool,
    action: Action,
    project: Project,
    message: String,
}

enum Lookup {
    /// Acts on the caller's project with this name, creating it if needed.
    ByName {
        name: &'static str,
        description: &'static str,
    },
    /// Acts on the caller's project whose id is given as `project_id`.
    ById,
}

/// A lookup resolved against the request body.
enum Target {
    Named {
        name: &'static str,
        description: &'static str,
    },
    Id(String),
}

pub struct ConnectionEndpoint {
    name: &'static str,
    lookup: Lookup,
    backend: Arc<dyn Backend>,
}

impl ConnectionEndpoint {
    pub fn by_name(
        name: &'static str,
        project_name: &'static str,
        description: &'static str,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            name,
            lookup: Lookup::ByName {
                name: project_name,
                description,
            },
            backend,
        }
    }

    pub fn by_id(name: &'static str, backend: Arc<dyn Backend>) -> Self {
        Self {
            name,
            lookup: Lookup::ById,
            backend,
        }
    }

    async fn authenticate(&self, request: &Request<Bytes>) -> Result<UserId, EndpointError> {
        let token = bearer_token(request).ok_or(EndpointError::Unauthorized)?;
        self.backend
            .authenticate(token)
            .await?
            .ok_or(EndpointError::Unauthorized)
    }

    async fn connect(&self, request: Request<Bytes>) -> Result<ConnectionBody, EndpointError> {
        // A malformed body is rejected before any session lookup.
        let target = match self.lookup {
            Lookup::ByName { name, description } => Target::Named { name, description },
            Lookup::ById => {
                let payload = parse_json_body(request.body())?;
                Target::Id(required_str(&payload, "/project_id", "project_id")?)
            }
        };
        let owner = self.authenticate(&request).await?;

        let link = ProjectLink {
            external_connection: Some(PARTNER_LINK.to_string()),
            is_active: true,
        };

        let (action, project) = match target {
            Target::Named { name, description } => {
                match self.backend.find_project_by_name(&owner, name).await? {
                    Some(existing) => (
                        Action::Updated,
                        self.backend.update_project_link(&existing.id, link).await?,
                    ),
                    None => {
                        let project = NewProject {
                            name: name.to_string(),
                            description: Some(description.to_string()),
                            is_active: link.is_active,
                            external_connection: link.external_connection,
                            user_id: owner.clone(),
                        };
                        (Action::Created, self.backend.insert_project(project).await?)
                    }
                }
            }
            Target::Id(project_id) => {
                let existing = self
                    .backend
                    .find_owned_project(&owner, &project_id)
                    .await?
                    .ok_or(EndpointError::NotFound)?;
                (
                    Action::Updated,
                    self.backend.update_project_link(&existing.id, link).await?,
                )
            }
        };

        let verb = match action {
            Action::Created => "created",
            Action::Updated => "updated",
        };
        counter!(PROJECT_CONNECTIONS, "action" => verb).increment(1);
        tracing::info!(
            endpoint = self.name,
            project_id = %project.id,
            user_id = %owner,
            action = verb,
            "project linked to partner"
        );

        Ok(ConnectionBody {
            success: true,
            action,
            message: format!(
                "Project \"{}\" {verb} and connected to {PARTNER_LINK}",
                project.name
            ),
            project,
        })
    }
}

#[async_trait]
impl Endpoint for ConnectionEndpoint {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> Method {
        Method::POST
    }

    async fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        match self.connect(request).await {
            Ok(body) => json_response(StatusCode::OK, &body),
            Err(e) => {
                match &e {
                    EndpointError::Persistence(_) | EndpointError::Config(_) => {
                        tracing::error!(endpoint = self.name, error = %e, "connection failed")
                    }
                    _ => tracing::debug!(endpoint = self.name, error = %e, "connection rejected"),
                }
                e.into_response()
            }
        }
    }
}
