// Browser automation boundary.
//
// BrowserDriver is what discovery needs from a real browser. It takes
// `&mut self` everywhere: one driver serves one caller at a time, and
// BrowserActor is that caller. BrowserLauncher creates drivers lazily.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque element reference, valid in the browsing context it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// The two network log events discovery reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkEvent {
    RequestWillBeSent { url: String },
    ResponseReceived { url: String, content_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub level: String,
    pub message: String,
    pub timestamp_ms: i64,
}

#[async_trait]
pub trait BrowserDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;
    async fn current_url(&mut self) -> Result<String>;
    async fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>>;
    async fn find_child_elements(
        &mut self,
        parent: &ElementHandle,
        css: &str,
    ) -> Result<Vec<ElementHandle>>;
    /// Attribute or resolved property (`href`, `src`), `None` when absent.
    async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>>;
    async fn text(&mut self, element: &ElementHandle) -> Result<String>;
    async fn is_displayed(&mut self, element: &ElementHandle) -> Result<bool>;
    async fn click(&mut self, element: &ElementHandle) -> Result<()>;
    /// Run a script; `args` are exposed to it as `arguments[i]`.
    async fn execute_script(&mut self, script: &str, args: Vec<ElementHandle>) -> Result<()>;
    async fn window_handles(&mut self) -> Result<Vec<String>>;
    async fn current_window(&mut self) -> Result<String>;
    async fn switch_window(&mut self, handle: &str) -> Result<()>;
    /// Close the current window. The caller must switch to another one.
    async fn close_window(&mut self) -> Result<()>;
    async fn switch_to_frame(&mut self, frame: &ElementHandle) -> Result<()>;
    async fn switch_to_default_content(&mut self) -> Result<()>;
    /// Network events recorded since the previous call.
    async fn network_log(&mut self) -> Result<Vec<NetworkEvent>>;
    /// Console messages recorded since the previous call.
    async fn console_log(&mut self) -> Result<Vec<ConsoleEntry>>;
    async fn screenshot(&mut self) -> Result<Vec<u8>>;
    async fn quit(&mut self) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>>;
}
