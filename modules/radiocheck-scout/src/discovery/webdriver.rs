use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tracing::{info, warn};
use webdriver_client::{chrome_capabilities, ElementRef, Session, WebDriverClient};

use super::browser::{BrowserDriver, BrowserLauncher, ConsoleEntry, ElementHandle, NetworkEvent};

/// Max attempts to get a session from the driver. Fresh Chrome processes
/// fail to start now and then under memory pressure.
const LAUNCH_MAX_ATTEMPTS: u32 = 3;
/// Base backoff between launch attempts. Actual delay is base * 3^attempt + jitter.
const LAUNCH_RETRY_BASE: Duration = Duration::from_secs(3);

const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

// --- Launcher ---

pub struct WebDriverLauncher {
    client: WebDriverClient,
    headless: bool,
    warmup: Duration,
}

impl WebDriverLauncher {
    pub fn new(webdriver_url: &str, headless: bool, warmup: Duration) -> Result<Self> {
        let client = WebDriverClient::new(webdriver_url).context("Failed to build WebDriver client")?;
        Ok(Self {
            client,
            headless,
            warmup,
        })
    }

    async fn new_session(&self) -> Result<Session> {
        let capabilities = chrome_capabilities(self.headless);
        let mut attempt = 0;
        loop {
            match self.client.new_session(&capabilities).await {
                Ok(session) => return Ok(session),
                Err(e) if attempt + 1 < LAUNCH_MAX_ATTEMPTS => {
                    let backoff = LAUNCH_RETRY_BASE * 3u32.pow(attempt);
                    let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                    warn!(
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Browser session failed to start, retrying after backoff"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).context(format!(
                        "Browser session failed to start after {LAUNCH_MAX_ATTEMPTS} attempts"
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>> {
        let session = self.new_session().await?;
        if let Err(e) = session.execute(HIDE_WEBDRIVER_SCRIPT, Vec::new()).await {
            warn!(error = %e, "Could not hide webdriver flag");
        }
        info!(session_id = session.id(), headless = self.headless, "Browser session started");
        tokio::time::sleep(self.warmup).await;
        Ok(Box::new(WebDriverBrowser { session }))
    }
}

// --- Driver ---

pub struct WebDriverBrowser {
    session: Session,
}

fn element(handle: &ElementHandle) -> ElementRef {
    ElementRef(handle.0.clone())
}

fn handle(el: ElementRef) -> ElementHandle {
    ElementHandle(el.0)
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.session
            .navigate(url)
            .await
            .with_context(|| format!("navigate to {url}"))
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.session.current_url().await?)
    }

    async fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>> {
        let found = self.session.find_elements(css).await?;
        Ok(found.into_iter().map(handle).collect())
    }

    async fn find_child_elements(
        &mut self,
        parent: &ElementHandle,
        css: &str,
    ) -> Result<Vec<ElementHandle>> {
        let found = self.session.find_child_elements(&element(parent), css).await?;
        Ok(found.into_iter().map(handle).collect())
    }

    async fn attribute(&mut self, el: &ElementHandle, name: &str) -> Result<Option<String>> {
        // Properties give absolute `href`/`src`; handlers like `onclick` are
        // only readable as attributes.
        let el = element(el);
        match self.session.property(&el, name).await? {
            Some(value) if !value.is_empty() => Ok(Some(value)),
            _ => Ok(self.session.attribute(&el, name).await?),
        }
    }

    async fn text(&mut self, el: &ElementHandle) -> Result<String> {
        Ok(self.session.text(&element(el)).await?)
    }

    async fn is_displayed(&mut self, el: &ElementHandle) -> Result<bool> {
        match self.session.is_displayed(&element(el)).await {
            Ok(shown) => Ok(shown),
            // Detached by page scripts since it was found.
            Err(e) if e.is_stale() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn click(&mut self, el: &ElementHandle) -> Result<()> {
        Ok(self.session.click(&element(el)).await?)
    }

    async fn execute_script(&mut self, script: &str, args: Vec<ElementHandle>) -> Result<()> {
        let args = args.iter().map(|a| element(a).to_json()).collect();
        self.session.execute(script, args).await?;
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<String>> {
        Ok(self.session.window_handles().await?)
    }

    async fn current_window(&mut self) -> Result<String> {
        Ok(self.session.current_window().await?)
    }

    async fn switch_window(&mut self, handle: &str) -> Result<()> {
        Ok(self.session.switch_window(handle).await?)
    }

    async fn close_window(&mut self) -> Result<()> {
        self.session.close_window().await?;
        Ok(())
    }

    async fn switch_to_frame(&mut self, frame: &ElementHandle) -> Result<()> {
        Ok(self.session.switch_to_frame(&element(frame)).await?)
    }

    async fn switch_to_default_content(&mut self) -> Result<()> {
        Ok(self.session.switch_to_default_content().await?)
    }

    async fn network_log(&mut self) -> Result<Vec<NetworkEvent>> {
        let entries = self.session.logs("performance").await?;
        Ok(entries
            .iter()
            .filter_map(|e| parse_performance_message(&e.message))
            .collect())
    }

    async fn console_log(&mut self) -> Result<Vec<ConsoleEntry>> {
        let entries = self.session.logs("browser").await?;
        Ok(entries
            .into_iter()
            .map(|e| ConsoleEntry {
                level: e.level,
                message: e.message,
                timestamp_ms: e.timestamp,
            })
            .collect())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(self.session.screenshot().await?)
    }

    async fn quit(&mut self) -> Result<()> {
        self.session.delete().await?;
        Ok(())
    }
}

/// Pull a [`NetworkEvent`] out of one Chrome performance log message:
/// `{"message": {"method": "Network.…", "params": {…}}, "webview": "…"}`.
pub fn parse_performance_message(raw: &str) -> Option<NetworkEvent> {
    let doc: Value = serde_json::from_str(raw).ok()?;
    let message = doc.get("message")?;
    let params = message.get("params")?;
    match message.get("method")?.as_str()? {
        "Network.requestWillBeSent" => {
            let url = params.pointer("/request/url")?.as_str()?;
            Some(NetworkEvent::RequestWillBeSent {
                url: url.to_string(),
            })
        }
        "Network.responseReceived" => {
            let response = params.get("response")?;
            let url = response.get("url")?.as_str()?;
            let header = |name: &str| {
                response
                    .pointer(&format!("/headers/{name}"))
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
            };
            let content_type = header("content-type")
                .or_else(|| header("Content-Type"))
                .or_else(|| response.get("mimeType").and_then(Value::as_str))
                .unwrap_or_default()
                .to_lowercase();
            Some(NetworkEvent::ResponseReceived {
                url: url.to_string(),
                content_type,
            })
        }
        _ => None,
    }
}
