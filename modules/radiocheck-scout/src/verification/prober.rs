use std::error::Error as StdError;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use super::classifier::ProbeObservation;

/// User agent sent with every probe. Some stream servers refuse unknown clients.
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0";

// --- StreamHttp trait ---

/// Every HTTP request the engine makes outside the browser goes through here.
#[async_trait]
pub trait StreamHttp: Send + Sync {
    /// One streaming GET: wait for headers, read a single chunk, stop.
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeObservation;

    /// HEAD with redirects; true when the final status is below 400.
    async fn site_exists(&self, url: &str, timeout: Duration) -> bool;

    /// GET a JSON document with the probe headers.
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value>;
}

// --- reqwest implementation ---

pub struct HttpProber {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpProber {
    /// `connect_timeout` bounds DNS + TCP + TLS. Running out of it counts as a
    /// transport failure. The per-call timeout covers headers and the first
    /// chunk once connected.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(probe_headers())
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build probe HTTP client")?;
        Ok(Self {
            client,
            connect_timeout,
        })
    }

    /// Deadline for `send()`. It always outlasts the connect bound so a host
    /// that never accepts the connection surfaces as a connect error.
    fn send_budget(&self, timeout: Duration) -> Duration {
        self.connect_timeout + timeout
    }
}

fn probe_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert("icy-metadata", HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    headers
}

#[async_trait]
impl StreamHttp for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeObservation {
        let send = self.client.get(url).send();
        let mut resp = match tokio::time::timeout(self.send_budget(timeout), send).await {
            Err(_) => return ProbeObservation::Timeout("no response headers".to_string()),
            Ok(Err(e)) => return observe_error(&e),
            Ok(Ok(resp)) => resp,
        };

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        let icy = resp
            .headers()
            .keys()
            .any(|name| name.as_str().starts_with("icy-"));

        match tokio::time::timeout(timeout, resp.chunk()).await {
            Err(_) => ProbeObservation::Timeout("no body within timeout".to_string()),
            Ok(Err(e)) => observe_error(&e),
            Ok(Ok(_)) => {
                debug!(url, status, content_type = content_type.as_str(), icy, "Probe response");
                ProbeObservation::Response {
                    status,
                    content_type,
                    icy,
                }
            }
        }
    }

    async fn site_exists(&self, url: &str, timeout: Duration) -> bool {
        match self.client.head(url).timeout(timeout).send().await {
            Ok(resp) => resp.status().as_u16() < 400,
            Err(e) => {
                debug!(url, error = %e, "Site check failed");
                false
            }
        }
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned status {status}");
        }
        resp.json().await.with_context(|| format!("Invalid JSON from {url}"))
    }
}

/// Map a reqwest failure onto the probe taxonomy. TLS is checked first since
/// handshake failures also surface as connect errors.
fn observe_error(err: &reqwest::Error) -> ProbeObservation {
    let causes = cause_chain(err);
    if is_tls_failure(&causes) {
        return ProbeObservation::Tls(causes);
    }
    let detail = if causes.is_empty() {
        err.to_string()
    } else {
        causes
    };
    if err.is_connect() {
        return ProbeObservation::Transport(detail);
    }
    if err.is_timeout() {
        return ProbeObservation::Timeout(detail);
    }
    ProbeObservation::Other(detail)
}

/// Messages of the errors under `err`. The top level is skipped: it repeats
/// the request URL, and URL text must not decide the TLS check.
fn cause_chain(err: &reqwest::Error) -> String {
    let mut parts = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

fn is_tls_failure(chain: &str) -> bool {
    let lower = chain.to_lowercase();
    ["tls", "ssl", "certificate", "handshake"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_markers() {
        assert!(is_tls_failure("error trying to connect: invalid peer certificate: UnknownIssuer"));
        assert!(is_tls_failure("SSL routines::wrong version number"));
        assert!(!is_tls_failure("tcp connect error: Connection refused (os error 111)"));
    }

    #[test]
    fn send_deadline_outlasts_connect_bound() {
        let prober = HttpProber::new(Duration::from_secs(3)).unwrap();
        assert_eq!(prober.send_budget(Duration::from_secs(5)), Duration::from_secs(8));
        assert!(prober.send_budget(Duration::from_millis(1)) > Duration::from_secs(3));
    }

    #[test]
    fn probe_headers_ask_for_icy_metadata() {
        let headers = probe_headers();
        assert_eq!(headers.get("Icy-MetaData").unwrap(), "1");
        assert_eq!(headers.get(CONNECTION).unwrap(), "close");
    }
}
