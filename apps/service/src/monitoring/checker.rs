use std::io::ErrorKind;
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use super::types::ProbeOutcome;
use crate::error::WatchdogError;

/// Default bound on a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Checker trait for the different probe strategies.
///
/// Implementations never fail: every network problem becomes a `down` outcome
/// with a human-readable cause.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Run the probe against the bound target
    async fn check(&self) -> ProbeOutcome;

    /// Short description of what is probed, for logging
    fn describe(&self) -> String;
}

/// TCP port checker
pub struct TcpChecker {
    host: String,
    port: u16,
    timeout_duration: Duration,
}

impl TcpChecker {
    pub fn new(host: impl Into<String>, port: u16, timeout_duration: Duration) -> Self {
        Self { host: host.into(), port, timeout_duration }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self) -> ProbeOutcome {
        let start = Instant::now();
        let connect = TcpStream::connect((self.host.as_str(), self.port));

        match timeout(self.timeout_duration, connect).await {
            Ok(Ok(_stream)) => ProbeOutcome::up(start.elapsed()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => ProbeOutcome::down(
                start.elapsed(),
                format!("Connection refused to {}", self.address()),
            ),
            Ok(Err(e)) => ProbeOutcome::down(
                start.elapsed(),
                format!("Error connecting to {}: {}", self.address(), e),
            ),
            Err(_) => ProbeOutcome::down(
                start.elapsed(),
                format!("Timeout connecting to {}", self.address()),
            ),
        }
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address())
    }
}

/// HTTP/HTTPS checker.
///
/// Certificate verification is disabled on purpose: monitored services are
/// often internal endpoints with self-signed certificates.
pub struct HttpChecker {
    client: reqwest::Client,
    url: Url,
}

impl HttpChecker {
    pub fn new(
        host: &str,
        port: u16,
        timeout_duration: Duration,
        use_tls: bool,
        path: &str,
    ) -> Result<Self, WatchdogError> {
        let url = build_url(host, port, use_tls, path)?;
        let client = reqwest::Client::builder()
            .timeout(timeout_duration)
            .danger_accept_invalid_certs(use_tls)
            .build()?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self) -> ProbeOutcome {
        let start = Instant::now();

        match self.client.get(self.url.clone()).send().await {
            Ok(response) => {
                let latency = start.elapsed();
                let status = response.status();

                // 2xx and 3xx count as up
                if status.is_success() || status.is_redirection() {
                    ProbeOutcome::up(latency)
                } else {
                    ProbeOutcome::down(
                        latency,
                        format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        ),
                    )
                }
            }
            Err(e) if e.is_timeout() => {
                ProbeOutcome::down(start.elapsed(), format!("HTTP timeout for {}", self.url))
            }
            Err(e) if e.is_connect() => {
                ProbeOutcome::down(start.elapsed(), format!("HTTP connection error for {}", self.url))
            }
            Err(e) => {
                ProbeOutcome::down(start.elapsed(), format!("HTTP error for {}: {}", self.url, e))
            }
        }
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// Build `scheme://host:port/path`, bracketing IPv6 literals
fn build_url(host: &str, port: u16, use_tls: bool, path: &str) -> Result<Url, WatchdogError> {
    let scheme = if use_tls { "https" } else { "http" };
    let authority = if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };

    Url::parse(&format!("{scheme}://{authority}{path}"))
        .map_err(|e| WatchdogError::InvalidTarget(format!("cannot build URL for {host}: {e}")))
}
