//! Single-shot HTTPS reachability probe.
//!
//! A probe opens a fresh TCP connection, completes a TLS handshake without
//! verifying the server certificate, sends `GET /` and returns whatever
//! status code comes back. Every step shares one overall timeout.

use std::future::Future;
use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::{Request, StatusCode};
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::tls::insecure_client_config;

/// Port the Kubernetes API server listens on.
pub const DEFAULT_PROBE_PORT: u16 = 6443;

/// Upper bound on one probe, connect through response headers.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a probe got no response. Always maps to an unhealthy gauge.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe address {0:?}")]
    InvalidAddress(String),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("tls handshake failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("http exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("no response within {0:?}")]
    TimedOut(Duration),

    #[error("tls configuration error: {0}")]
    Config(#[from] rustls::Error),
}

/// A reachability check against one address.
pub trait Probe: Send + Sync + 'static {
    /// Probe `address` once. `Ok` carries the status code of any response.
    fn probe(&self, address: &str) -> impl Future<Output = Result<StatusCode, ProbeError>> + Send;
}

/// Probes `https://{address}:{port}/` with certificate checks disabled.
#[derive(Clone)]
pub struct HttpsProbe {
    connector: TlsConnector,
    port: u16,
    timeout: Duration,
}

impl std::fmt::Debug for HttpsProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsProbe")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpsProbe {
    pub fn new(port: u16, timeout: Duration) -> Result<Self, ProbeError> {
        Ok(Self {
            connector: TlsConnector::from(insecure_client_config()?),
            port,
            timeout,
        })
    }

    /// Probe the API server port with the standard timeout.
    pub fn api_server() -> Result<Self, ProbeError> {
        Self::new(DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT)
    }

    /// The URL this probe requests for `address`.
    pub fn target_uri(&self, address: &str) -> String {
        format!("https://{}", authority(address, self.port))
    }

    async fn exchange(&self, address: &str) -> Result<StatusCode, ProbeError> {
        let server_name = ServerName::try_from(address)
            .map(|name| name.to_owned())
            .map_err(|_| ProbeError::InvalidAddress(address.to_string()))?;

        let stream = TcpStream::connect((address, self.port))
            .await
            .map_err(ProbeError::Connect)?;
        let tls = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(ProbeError::Tls)?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls)).await?;

        // Drive the connection in the background; it ends when `sender` drops.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "probe connection closed with error");
            }
        });

        let req = Request::get("/")
            .header(HOST, authority(address, self.port))
            .header(USER_AGENT, concat!("apiprobe/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await?;
        Ok(resp.status())
    }
}

impl Probe for HttpsProbe {
    async fn probe(&self, address: &str) -> Result<StatusCode, ProbeError> {
        debug!(uri = %self.target_uri(address), "sending probe request");
        match tokio::time::timeout(self.timeout, self.exchange(address)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::TimedOut(self.timeout)),
        }
    }
}

/// `host:port`, bracketing IPv6 literals.
fn authority(address: &str, port: u16) -> String {
    if address.parse::<Ipv6Addr>().is_ok() {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}
