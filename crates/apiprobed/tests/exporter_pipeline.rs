//! End-to-end exporter tests.
//!
//! Drives the real pieces together: a shell command standing in for
//! kubectl, HTTPS probes against an in-process self-signed TLS server, the
//! reconciler loop, and scrapes through the axum router.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use apiprobe_api::build_router;
use apiprobe_health::{HttpsProbe, ProberConfig};
use apiprobe_inventory::KubectlInventory;
use apiprobe_metrics::HealthRegistry;
use apiprobe_reconcile::{Reconciler, ReconcilerConfig};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::sync::watch;
use tower::ServiceExt;

/// Serve HTTPS on 127.0.0.1 with a self-signed cert, answering every
/// request with 403. Returns the port.
fn start_api_server() -> u16 {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(vec!["kube-apiserver".to_string()]).unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    let server_cert = rustls::pki_types::CertificateDer::from(cert.der().to_vec());
    let server_key = rustls::pki_types::PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap();
    let server_config = Arc::new(
        rustls::ServerConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![server_cert], server_key)
            .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        for tcp in listener.incoming() {
            let Ok(tcp) = tcp else { continue };
            let config = server_config.clone();
            std::thread::spawn(move || {
                let conn = rustls::ServerConnection::new(config).unwrap();
                let mut tls = rustls::StreamOwned::new(conn, tcp);
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut buf) {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tls.write_all(b"HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\n\r\n");
                let _ = tls.flush();
            });
        }
    });
    port
}

fn write_inventory(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}

fn inventory_from_file(path: &Path) -> KubectlInventory {
    KubectlInventory::with_command(
        "cat",
        vec![path.display().to_string()],
        Duration::from_secs(5),
    )
}

fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        interval: Duration::from_millis(300),
        prober: ProberConfig {
            interval: Duration::from_millis(100),
        },
    }
}

async fn scrape(registry: &HealthRegistry) -> String {
    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = build_router(registry.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Scrape until `pred` holds or give up after five seconds.
async fn scrape_until(registry: &HealthRegistry, pred: impl Fn(&str) -> bool) -> String {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let body = scrape(registry).await;
        if pred(&body) || tokio::time::Instant::now() > deadline {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn exporter_tracks_inventory_and_reachability() {
    let port = start_api_server();
    let dir = tempfile::tempdir().unwrap();
    let inventory_path = dir.path().join("services.txt");
    write_inventory(
        &inventory_path,
        "tenant-up     127.0.0.1\ntenant-down   127.0.0.2\ntenant-new    <none>\n",
    );

    let registry = HealthRegistry::new();
    let reconciler = Reconciler::new(
        inventory_from_file(&inventory_path),
        HttpsProbe::new(port, Duration::from_secs(2)).unwrap(),
        registry.clone(),
        fast_config(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(reconciler.run(shutdown_rx));

    let up = r#"api_health_status{name="tenant-up",ip="127.0.0.1"} 1"#;
    let down = r#"api_health_status{name="tenant-down",ip="127.0.0.2"} 0"#;

    let body = scrape_until(&registry, |b| b.contains(up) && b.contains(down)).await;
    assert!(body.contains(up), "missing healthy gauge:\n{body}");
    assert!(body.contains(down), "missing unhealthy gauge:\n{body}");
    assert!(!body.contains("tenant-new"));

    // tenant-down disappears, tenant-new gets an address.
    write_inventory(&inventory_path, "tenant-up 127.0.0.1\ntenant-new 127.0.0.1\n");
    let new = r#"api_health_status{name="tenant-new",ip="127.0.0.1"} 1"#;
    let body = scrape_until(&registry, |b| !b.contains("tenant-down") && b.contains(new)).await;
    assert!(!body.contains("tenant-down"), "stale gauge still exported:\n{body}");
    assert!(body.contains(new), "new endpoint not probed:\n{body}");
    assert!(body.contains(up));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn inventory_outage_keeps_existing_gauges() {
    let port = start_api_server();
    let dir = tempfile::tempdir().unwrap();
    let inventory_path = dir.path().join("services.txt");
    write_inventory(&inventory_path, "svc1 127.0.0.1\n");

    let registry = HealthRegistry::new();
    let reconciler = Reconciler::new(
        inventory_from_file(&inventory_path),
        HttpsProbe::new(port, Duration::from_secs(2)).unwrap(),
        registry.clone(),
        fast_config(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(reconciler.run(shutdown_rx));

    let svc1 = r#"api_health_status{name="svc1",ip="127.0.0.1"} 1"#;
    let body = scrape_until(&registry, |b| b.contains(svc1)).await;
    assert!(body.contains(svc1));

    // `cat` on a missing file exits non-zero.
    std::fs::remove_file(&inventory_path).unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(scrape(&registry).await.contains(svc1));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(registry.is_empty());
}
