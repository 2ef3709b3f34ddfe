pub mod error;
pub mod types;

pub use error::{Result, WebDriverError};
pub use types::{chrome_capabilities, ElementRef, LogEntry, DESKTOP_USER_AGENT, ELEMENT_KEY};

use std::time::Duration;

use base64::Engine;
use reqwest::Method;
use serde_json::{json, Value};
use types::{Envelope, ErrorValue, NewSessionValue};

/// Client for a WebDriver endpoint such as a local chromedriver.
#[derive(Clone)]
pub struct WebDriverClient {
    client: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Start a browser session with the given `{"capabilities": ..}` body.
    pub async fn new_session(&self, capabilities: &Value) -> Result<Session> {
        let value = self
            .send(Method::POST, "/session", Some(capabilities.clone()))
            .await?;
        let created: NewSessionValue = serde_json::from_value(value)?;
        tracing::debug!(session_id = %created.session_id, "WebDriver session created");

        Ok(Session {
            client: self.clone(),
            id: created.session_id,
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method.clone(), &url);
        if method == Method::POST {
            req = req.json(&body.unwrap_or_else(|| json!({})));
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let (error, message) = match serde_json::from_str::<Envelope<ErrorValue>>(&text) {
                Ok(env) => (env.value.error, env.value.message),
                Err(_) => ("unknown error".to_string(), text),
            };
            return Err(WebDriverError::Api {
                status: status.as_u16(),
                error,
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let envelope: Envelope<Value> = serde_json::from_str(&text)?;
        Ok(envelope.value)
    }
}

/// A live browser session. Calls are plain HTTP requests; callers that share
/// one session across tasks must serialize access themselves.
pub struct Session {
    client: WebDriverClient,
    id: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let full = format!("/session/{}{}", self.id, path);
        self.client.send(method, &full, body).await
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.call(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self.call(Method::GET, "/url", None).await?;
        expect_string(value, "current url")
    }

    pub async fn find_elements(&self, css: &str) -> Result<Vec<ElementRef>> {
        let value = self
            .call(
                Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        element_list(value)
    }

    pub async fn find_child_elements(&self, parent: &ElementRef, css: &str) -> Result<Vec<ElementRef>> {
        let value = self
            .call(
                Method::POST,
                &format!("/element/{}/elements", parent.0),
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await?;
        element_list(value)
    }

    /// Markup attribute as written in the document. `None` when absent.
    pub async fn attribute(&self, el: &ElementRef, name: &str) -> Result<Option<String>> {
        let value = self
            .call(Method::GET, &format!("/element/{}/attribute/{}", el.0, name), None)
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    /// DOM property (e.g. `href` resolved to an absolute URL). `None` when the
    /// property is missing or not a string.
    pub async fn property(&self, el: &ElementRef, name: &str) -> Result<Option<String>> {
        let value = self
            .call(Method::GET, &format!("/element/{}/property/{}", el.0, name), None)
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn text(&self, el: &ElementRef) -> Result<String> {
        let value = self
            .call(Method::GET, &format!("/element/{}/text", el.0), None)
            .await?;
        expect_string(value, "element text")
    }

    pub async fn is_displayed(&self, el: &ElementRef) -> Result<bool> {
        let value = self
            .call(Method::GET, &format!("/element/{}/displayed", el.0), None)
            .await?;
        value
            .as_bool()
            .ok_or_else(|| WebDriverError::Protocol(format!("expected bool, got {value}")))
    }

    pub async fn click(&self, el: &ElementRef) -> Result<()> {
        self.call(Method::POST, &format!("/element/{}/click", el.0), None)
            .await?;
        Ok(())
    }

    /// Run a synchronous script. Elements are passed as `ElementRef::to_json()`.
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.call(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    pub async fn window_handles(&self) -> Result<Vec<String>> {
        let value = self.call(Method::GET, "/window/handles", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn current_window(&self) -> Result<String> {
        let value = self.call(Method::GET, "/window", None).await?;
        expect_string(value, "window handle")
    }

    pub async fn switch_window(&self, handle: &str) -> Result<()> {
        self.call(Method::POST, "/window", Some(json!({ "handle": handle })))
            .await?;
        Ok(())
    }

    /// Close the current window. Returns the handles still open.
    pub async fn close_window(&self) -> Result<Vec<String>> {
        let value = self.call(Method::DELETE, "/window", None).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    pub async fn switch_to_frame(&self, frame: &ElementRef) -> Result<()> {
        self.call(Method::POST, "/frame", Some(json!({ "id": frame.to_json() })))
            .await?;
        Ok(())
    }

    pub async fn switch_to_default_content(&self) -> Result<()> {
        self.call(Method::POST, "/frame", Some(json!({ "id": null })))
            .await?;
        Ok(())
    }

    /// Drain a log buffer (`performance` or `browser`). Each call returns only
    /// entries recorded since the previous call.
    pub async fn logs(&self, log_type: &str) -> Result<Vec<LogEntry>> {
        let value = self
            .call(Method::POST, "/se/log", Some(json!({ "type": log_type })))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// PNG screenshot of the current viewport.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let value = self.call(Method::GET, "/screenshot", None).await?;
        let encoded = expect_string(value, "screenshot")?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| WebDriverError::Protocol(format!("screenshot is not base64: {e}")))
    }

    /// End the session and close the browser. The session is unusable after.
    pub async fn delete(&self) -> Result<()> {
        self.client
            .send(Method::DELETE, &format!("/session/{}", self.id), None)
            .await?;
        tracing::debug!(session_id = %self.id, "WebDriver session deleted");
        Ok(())
    }
}

fn expect_string(value: Value, what: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(WebDriverError::Protocol(format!(
            "expected string for {what}, got {other}"
        ))),
    }
}

fn element_list(value: Value) -> Result<Vec<ElementRef>> {
    let items = value
        .as_array()
        .ok_or_else(|| WebDriverError::Protocol(format!("expected element list, got {value}")))?;
    Ok(items.iter().filter_map(ElementRef::from_json).collect())
}
