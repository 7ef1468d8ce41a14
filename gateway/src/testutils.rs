use http::HeaderMap;
use http::header::{CONTENT_TYPE, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// What the mock upstream answers to every request.
#[derive(Clone)]
pub struct MockReply {
    status: StatusCode,
    body: &'static str,
    content_type: &'static str,
    delay: Duration,
}

impl MockReply {
    pub fn json(status: u16, body: &'static str) -> Self {
        MockReply {
            status: StatusCode::from_u16(status).unwrap(),
            body,
            content_type: "application/json",
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &'static str) -> Self {
        MockReply {
            content_type: "text/plain",
            ..Self::json(status, body)
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Local HTTP server standing in for a partner API or webhook.
pub struct MockUpstream {
    port: u16,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn spawn(reply: MockReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();

        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (task_hits, task_requests) = (hits.clone(), requests.clone());
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let (hits, requests, reply) =
                    (task_hits.clone(), task_requests.clone(), reply.clone());

                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let (hits, requests, reply) =
                            (hits.clone(), requests.clone(), reply.clone());
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            let (parts, body) = req.into_parts();
                            let body = body
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_default();
                            requests.lock().push(ReceivedRequest {
                                method: parts.method,
                                path: parts.uri.path().to_string(),
                                headers: parts.headers,
                                body,
                            });

                            tokio::time::sleep(reply.delay).await;

                            let mut response = Response::new(Full::new(Bytes::from(reply.body)));
                            *response.status_mut() = reply.status;
                            response.headers_mut().insert(
                                CONTENT_TYPE,
                                HeaderValue::from_static(reply.content_type),
                            );
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        MockUpstream {
            port,
            hits,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}/", self.port)).unwrap()
    }

    pub fn url_with_path(&self, path: &str) -> Url {
        self.url().join(path).unwrap()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A URL on a port that was just released, so connecting fails fast.
pub async fn unreachable_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap()
}
