use crate::types::{
    ErrorLogEntry, NewProject, NotificationRecord, Project, ProjectLink, Table, UserId,
};
use crate::{Backend, BackendError};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const AUTH_USER_PATH: &str = "auth/v1/user";
const REST_PATH: &str = "rest/v1";

#[derive(Deserialize)]
struct AuthUser {
    id: UserId,
}

/// Talks to the backend's auth service and its REST table interface.
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestBackend {
    pub fn new(base_url: Url, service_key: String, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(RestBackend {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn auth_url(&self) -> Result<Url, BackendError> {
        Ok(Url::parse(&format!("{}/{AUTH_USER_PATH}", self.base_url))?)
    }

    /// Builds `<base>/rest/v1/<table>` with equality filters.
    fn table_url(&self, table: Table, filters: &[(&str, &str)]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!("{}/{REST_PATH}/{}", self.base_url, table.as_str()))?;
        {
            let mut query = url.query_pairs_mut();
            for (column, value) in filters {
                query.append_pair(column, &format!("eq.{value}"));
            }
        }
        Ok(url)
    }

    fn with_service_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: Table,
        filters: &[(&str, &str)],
    ) -> Result<Option<T>, BackendError> {
        let mut url = self.table_url(table, filters)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("limit", "1");

        let response = self
            .with_service_auth(self.client.get(url))
            .send()
            .await?;
        let mut rows: Vec<T> = ensure_success(response).await?.json().await?;

        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn insert<B: serde::Serialize + Sync>(
        &self,
        table: Table,
        row: &B,
    ) -> Result<Response, BackendError> {
        let url = self.table_url(table, &[])?;
        let response = self
            .with_service_auth(self.client.post(url))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn first_row(response: Response, table: Table) -> Result<Project, BackendError> {
    let mut rows: Vec<Project> = response.json().await?;
    if rows.is_empty() {
        return Err(BackendError::EmptyResult(table.as_str()));
    }
    Ok(rows.swap_remove(0))
}

#[async_trait]
impl Backend for RestBackend {
    async fn authenticate(&self, access_token: &str) -> Result<Option<UserId>, BackendError> {
        let response = self
            .client
            .get(self.auth_url()?)
            .header("apikey", &self.service_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => {
                let user: AuthUser = ensure_success(response).await?.json().await?;
                Ok(Some(user.id))
            }
        }
    }

    async fn find_project_by_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Project>, BackendError> {
        self.select_one(Table::Projects, &[("name", name), ("user_id", owner)])
            .await
    }

    async fn find_owned_project(
        &self,
        owner: &str,
        project_id: &str,
    ) -> Result<Option<Project>, BackendError> {
        self.select_one(Table::Projects, &[("id", project_id), ("user_id", owner)])
            .await
    }

    async fn insert_project(&self, project: NewProject) -> Result<Project, BackendError> {
        let response = self.insert(Table::Projects, &project).await?;
        first_row(response, Table::Projects).await
    }

    async fn update_project_link(
        &self,
        project_id: &str,
        link: ProjectLink,
    ) -> Result<Project, BackendError> {
        let url = self.table_url(Table::Projects, &[("id", project_id)])?;
        let response = self
            .with_service_auth(self.client.patch(url))
            .header("Prefer", "return=representation")
            .json(&link)
            .send()
            .await?;
        first_row(ensure_success(response).await?, Table::Projects).await
    }

    async fn insert_error_log(&self, entry: ErrorLogEntry) -> Result<(), BackendError> {
        self.insert(Table::ErrorLogs, &entry).await?;
        Ok(())
    }

    async fn insert_notification(
        &self,
        notification: NotificationRecord,
    ) -> Result<(), BackendError> {
        self.insert(Table::Notifications, &notification).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::service::service_fn;
    use hyper::{Request, Response as HyperResponse};
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use parking_lot::Mutex;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[derive(Clone, Debug)]
    struct Seen {
        method: String,
        path_and_query: String,
        apikey: Option<String>,
        authorization: Option<String>,
        body: String,
    }

    // Minimal stand-in for the backend: answers by path.
    async fn start_backend(seen: Arc<Mutex<Vec<Seen>>>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let seen = seen.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await.unwrap().to_bytes();
                            let header = |name: &str| {
                                parts
                                    .headers
                                    .get(name)
                                    .and_then(|v| v.to_str().ok())
                                    .map(String::from)
                            };
                            seen.lock().push(Seen {
                                method: parts.method.to_string(),
                                path_and_query: parts.uri.to_string(),
                                apikey: header("apikey"),
                                authorization: header("authorization"),
                                body: String::from_utf8_lossy(&body).into_owned(),
                            });

                            let (status, reply) = match (parts.method.as_str(), parts.uri.path()) {
                                ("GET", "/auth/v1/user") => {
                                    if header("authorization").as_deref() == Some("Bearer good") {
                                        (200, r#"{"id":"user-1","email":"a@b.c"}"#)
                                    } else {
                                        (401, r#"{"msg":"invalid JWT"}"#)
                                    }
                                }
                                ("GET", "/rest/v1/projects") => (
                                    200,
                                    r#"[{"id":"p1","name":"Opravo","description":null,"is_active":true,"external_connection":null,"user_id":"user-1"}]"#,
                                ),
                                ("PATCH", "/rest/v1/projects") => (
                                    200,
                                    r#"[{"id":"p1","name":"Opravo","is_active":true,"external_connection":"sofinity","user_id":"user-1"}]"#,
                                ),
                                ("POST", "/rest/v1/error_logs") => (500, r#"{"message":"disk full"}"#),
                                _ => (404, "{}"),
                            };

                            let mut res = HyperResponse::new(Full::new(Bytes::from(reply)));
                            *res.status_mut() = hyper::StatusCode::from_u16(status).unwrap();
                            Ok::<_, Infallible>(res)
                        }
                    });
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap()
    }

    fn rest_backend(url: Url) -> RestBackend {
        RestBackend::new(url, "service-key".into(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_table_url_filters() {
        let backend = rest_backend(Url::parse("https://db.example.com/").unwrap());
        let url = backend
            .table_url(Table::Projects, &[("name", "Opravo"), ("user_id", "u 1")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://db.example.com/rest/v1/projects?name=eq.Opravo&user_id=eq.u+1"
        );
    }

    #[tokio::test]
    async fn test_authenticate() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = rest_backend(start_backend(seen.clone()).await);

        assert_eq!(
            backend.authenticate("good").await.unwrap(),
            Some("user-1".to_string())
        );
        assert_eq!(backend.authenticate("bad").await.unwrap(), None);

        let seen = seen.lock();
        assert_eq!(seen[0].apikey.as_deref(), Some("service-key"));
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer good"));
    }

    #[tokio::test]
    async fn test_find_and_update_project() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = rest_backend(start_backend(seen.clone()).await);

        let project = backend
            .find_project_by_name("user-1", "Opravo")
            .await
            .unwrap()
            .expect("project");
        assert_eq!(project.id, "p1");
        assert!(!project.is_linked());

        let updated = backend
            .update_project_link(
                "p1",
                ProjectLink {
                    external_connection: Some("sofinity".into()),
                    is_active: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.external_connection.as_deref(), Some("sofinity"));

        let seen = seen.lock();
        assert_eq!(seen[0].method, "GET");
        assert!(seen[0].path_and_query.contains("name=eq.Opravo"));
        assert!(seen[0].path_and_query.contains("user_id=eq.user-1"));
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer service-key"));
        assert_eq!(seen[1].method, "PATCH");
        assert!(seen[1].path_and_query.contains("id=eq.p1"));
        let body: serde_json::Value = serde_json::from_str(&seen[1].body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"external_connection": "sofinity", "is_active": true})
        );
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = rest_backend(start_backend(seen).await);

        let err = backend
            .insert_error_log(ErrorLogEntry {
                kind: "t".into(),
                payload: serde_json::Value::Null,
                error: crate::types::ErrorDetail {
                    message: "m".into(),
                    name: "n".into(),
                    stack: None,
                },
            })
            .await
            .unwrap_err();

        match err {
            BackendError::Status { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("disk full"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
