use backend::memory::MemoryBackend;
use gateway::GatewayService;
use gateway::config::{Config, Listener, PartnerConfig};
use gateway::errors::GatewayError;
use gateway::router::Router;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use monitor::probe::StatusProbe;
use monitor::source::HttpStatusSource;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Partner API that answers `{"isConnected":true}` after `delay`.
async fn spawn_partner(delay: Duration) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let svc = service_fn(move |_req: Request<Incoming>| async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(
                        br#"{"isConnected":true}"#,
                    ))))
                });
                let _ = Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });

    (addr, handle)
}

async fn spawn_gateway(partners: Vec<(&str, PartnerConfig)>) -> (SocketAddr, JoinHandle<()>) {
    let config = Config {
        listener: Listener {
            host: "127.0.0.1".into(),
            port: 1,
        },
        admin_listener: Listener {
            host: "127.0.0.1".into(),
            port: 2,
        },
        backend: Default::default(),
        partners: partners
            .into_iter()
            .map(|(name, partner)| (name.to_string(), partner))
            .collect(),
        relays: Default::default(),
    };
    let router = Router::from_config(&config, Arc::new(MemoryBackend::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = shared::http::serve::<_, GatewayError>(listener, GatewayService::new(router)).await;
    });

    (addr, handle)
}

fn probe_for(gateway: SocketAddr) -> StatusProbe {
    let url = Url::parse(&format!("http://{gateway}/functions/v1/sofinity-opravo-status")).unwrap();
    StatusProbe::new(Arc::new(HttpStatusSource::new(url, reqwest::Client::new())))
}

#[tokio::test]
async fn test_slow_partner_is_reported_disconnected_and_cached() {
    let (partner, partner_task) = spawn_partner(Duration::from_secs(4)).await;
    let (gateway, gateway_task) = spawn_gateway(vec![(
        "sofinity",
        PartnerConfig {
            base_url: Some(Url::parse(&format!("http://{partner}/")).unwrap()),
            api_key: Some("key".into()),
            ..Default::default()
        },
    )])
    .await;

    let probe = probe_for(gateway);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    probe.start_monitoring(move |status| {
        let _ = tx.send(status);
    });
    let status = rx.recv().await.unwrap();
    let elapsed = started.elapsed();

    assert!(!status.is_connected);
    assert_eq!(
        status.error.as_deref(),
        Some("sofinity API did not respond within 2000 ms")
    );
    assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(3000), "{elapsed:?}");
    assert_eq!(probe.get_cached(), Some(status));
    assert!(probe.is_monitoring());

    probe.stop_monitoring();
    gateway_task.abort();
    partner_task.abort();
}

#[tokio::test]
async fn test_unconfigured_partner_surfaces_http_status() {
    let (gateway, gateway_task) = spawn_gateway(vec![]).await;
    let probe = probe_for(gateway);

    let status = probe.check_once().await;

    assert!(!status.is_connected);
    assert_eq!(
        status.error.as_deref(),
        Some("status endpoint responded with 500 Internal Server Error")
    );

    gateway_task.abort();
}

#[tokio::test]
async fn test_connected_partner() {
    let (partner, partner_task) = spawn_partner(Duration::ZERO).await;
    let (gateway, gateway_task) = spawn_gateway(vec![(
        "sofinity",
        PartnerConfig {
            base_url: Some(Url::parse(&format!("http://{partner}/")).unwrap()),
            api_key: Some("key".into()),
            ..Default::default()
        },
    )])
    .await;

    let status = probe_for(gateway).check_once().await;

    assert!(status.is_connected);
    assert_eq!(status.error, None);
    let raw = status.raw_response.unwrap();
    assert_eq!(raw["apiResponse"]["status"], 200);

    gateway_task.abort();
    partner_task.abort();
}
