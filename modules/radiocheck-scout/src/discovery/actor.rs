//! Single owner of a [`BrowserDriver`].
//!
//! The driver lives inside a task that drains a command channel, so all
//! browser operations for one discovery unit are serialized and the driver
//! is quit exactly once, when the last handle is dropped or `shutdown` is
//! sent. Callers hold a cloneable [`BrowserHandle`].

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::browser::{BrowserDriver, ConsoleEntry, ElementHandle, NetworkEvent};

type Responder<T> = oneshot::Sender<Result<T>>;

pub enum BrowserCommand {
    Navigate {
        url: String,
        responder: Responder<()>,
    },
    CurrentUrl {
        responder: Responder<String>,
    },
    FindElements {
        css: String,
        responder: Responder<Vec<ElementHandle>>,
    },
    FindChildElements {
        parent: ElementHandle,
        css: String,
        responder: Responder<Vec<ElementHandle>>,
    },
    Attribute {
        element: ElementHandle,
        name: String,
        responder: Responder<Option<String>>,
    },
    Text {
        element: ElementHandle,
        responder: Responder<String>,
    },
    IsDisplayed {
        element: ElementHandle,
        responder: Responder<bool>,
    },
    Click {
        element: ElementHandle,
        responder: Responder<()>,
    },
    ExecuteScript {
        script: String,
        args: Vec<ElementHandle>,
        responder: Responder<()>,
    },
    WindowHandles {
        responder: Responder<Vec<String>>,
    },
    CurrentWindow {
        responder: Responder<String>,
    },
    SwitchWindow {
        handle: String,
        responder: Responder<()>,
    },
    CloseWindow {
        responder: Responder<()>,
    },
    SwitchToFrame {
        frame: ElementHandle,
        responder: Responder<()>,
    },
    SwitchToDefaultContent {
        responder: Responder<()>,
    },
    NetworkLog {
        responder: Responder<Vec<NetworkEvent>>,
    },
    ConsoleLog {
        responder: Responder<Vec<ConsoleEntry>>,
    },
    Screenshot {
        responder: Responder<Vec<u8>>,
    },
    Shutdown {
        responder: Responder<()>,
    },
}

pub struct BrowserActor {
    driver: Box<dyn BrowserDriver>,
    rx: mpsc::Receiver<BrowserCommand>,
}

impl BrowserActor {
    /// Move the driver into a new task and return a handle to it.
    pub fn spawn(driver: Box<dyn BrowserDriver>) -> BrowserHandle {
        let (tx, rx) = mpsc::channel(32);
        let actor = Self { driver, rx };
        tokio::spawn(actor.run());
        BrowserHandle { tx }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            if let BrowserCommand::Shutdown { responder } = cmd {
                let _ = responder.send(self.driver.quit().await);
                return;
            }
            self.handle(cmd).await;
        }
        // Every handle dropped without an explicit shutdown.
        if let Err(e) = self.driver.quit().await {
            warn!(error = %e, "Browser quit failed");
        }
    }

    async fn handle(&mut self, cmd: BrowserCommand) {
        let d = &mut self.driver;
        match cmd {
            BrowserCommand::Navigate { url, responder } => {
                let _ = responder.send(d.navigate(&url).await);
            }
            BrowserCommand::CurrentUrl { responder } => {
                let _ = responder.send(d.current_url().await);
            }
            BrowserCommand::FindElements { css, responder } => {
                let _ = responder.send(d.find_elements(&css).await);
            }
            BrowserCommand::FindChildElements {
                parent,
                css,
                responder,
            } => {
                let _ = responder.send(d.find_child_elements(&parent, &css).await);
            }
            BrowserCommand::Attribute {
                element,
                name,
                responder,
            } => {
                let _ = responder.send(d.attribute(&element, &name).await);
            }
            BrowserCommand::Text { element, responder } => {
                let _ = responder.send(d.text(&element).await);
            }
            BrowserCommand::IsDisplayed { element, responder } => {
                let _ = responder.send(d.is_displayed(&element).await);
            }
            BrowserCommand::Click { element, responder } => {
                let _ = responder.send(d.click(&element).await);
            }
            BrowserCommand::ExecuteScript {
                script,
                args,
                responder,
            } => {
                let _ = responder.send(d.execute_script(&script, args).await);
            }
            BrowserCommand::WindowHandles { responder } => {
                let _ = responder.send(d.window_handles().await);
            }
            BrowserCommand::CurrentWindow { responder } => {
                let _ = responder.send(d.current_window().await);
            }
            BrowserCommand::SwitchWindow { handle, responder } => {
                let _ = responder.send(d.switch_window(&handle).await);
            }
            BrowserCommand::CloseWindow { responder } => {
                let _ = responder.send(d.close_window().await);
            }
            BrowserCommand::SwitchToFrame { frame, responder } => {
                let _ = responder.send(d.switch_to_frame(&frame).await);
            }
            BrowserCommand::SwitchToDefaultContent { responder } => {
                let _ = responder.send(d.switch_to_default_content().await);
            }
            BrowserCommand::NetworkLog { responder } => {
                let _ = responder.send(d.network_log().await);
            }
            BrowserCommand::ConsoleLog { responder } => {
                let _ = responder.send(d.console_log().await);
            }
            BrowserCommand::Screenshot { responder } => {
                let _ = responder.send(d.screenshot().await);
            }
            BrowserCommand::Shutdown { .. } => {
                debug!("Shutdown is handled by the run loop");
            }
        }
    }
}

/// Cloneable front for a [`BrowserActor`].
#[derive(Clone)]
pub struct BrowserHandle {
    tx: mpsc::Sender<BrowserCommand>,
}

impl BrowserHandle {
    /// True once the actor has stopped and no command can reach the driver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send<T>(&self, build: impl FnOnce(Responder<T>) -> BrowserCommand) -> Result<T> {
        let (responder, rx) = oneshot::channel();
        self.tx
            .send(build(responder))
            .await
            .map_err(|_| anyhow!("Failed to send browser command: actor stopped"))?;
        rx.await
            .map_err(|_| anyhow!("Browser actor dropped the responder"))?
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.send(|responder| BrowserCommand::Navigate { url, responder })
            .await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.send(|responder| BrowserCommand::CurrentUrl { responder })
            .await
    }

    pub async fn find_elements(&self, css: &str) -> Result<Vec<ElementHandle>> {
        let css = css.to_string();
        self.send(|responder| BrowserCommand::FindElements { css, responder })
            .await
    }

    pub async fn find_child_elements(
        &self,
        parent: &ElementHandle,
        css: &str,
    ) -> Result<Vec<ElementHandle>> {
        let parent = parent.clone();
        let css = css.to_string();
        self.send(|responder| BrowserCommand::FindChildElements {
            parent,
            css,
            responder,
        })
        .await
    }

    pub async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let element = element.clone();
        let name = name.to_string();
        self.send(|responder| BrowserCommand::Attribute {
            element,
            name,
            responder,
        })
        .await
    }

    pub async fn text(&self, element: &ElementHandle) -> Result<String> {
        let element = element.clone();
        self.send(|responder| BrowserCommand::Text { element, responder })
            .await
    }

    pub async fn is_displayed(&self, element: &ElementHandle) -> Result<bool> {
        let element = element.clone();
        self.send(|responder| BrowserCommand::IsDisplayed { element, responder })
            .await
    }

    pub async fn click(&self, element: &ElementHandle) -> Result<()> {
        let element = element.clone();
        self.send(|responder| BrowserCommand::Click { element, responder })
            .await
    }

    pub async fn execute_script(&self, script: &str, args: Vec<ElementHandle>) -> Result<()> {
        let script = script.to_string();
        self.send(|responder| BrowserCommand::ExecuteScript {
            script,
            args,
            responder,
        })
        .await
    }

    pub async fn window_handles(&self) -> Result<Vec<String>> {
        self.send(|responder| BrowserCommand::WindowHandles { responder })
            .await
    }

    pub async fn current_window(&self) -> Result<String> {
        self.send(|responder| BrowserCommand::CurrentWindow { responder })
            .await
    }

    pub async fn switch_window(&self, handle: &str) -> Result<()> {
        let handle = handle.to_string();
        self.send(|responder| BrowserCommand::SwitchWindow { handle, responder })
            .await
    }

    pub async fn close_window(&self) -> Result<()> {
        self.send(|responder| BrowserCommand::CloseWindow { responder })
            .await
    }

    pub async fn switch_to_frame(&self, frame: &ElementHandle) -> Result<()> {
        let frame = frame.clone();
        self.send(|responder| BrowserCommand::SwitchToFrame { frame, responder })
            .await
    }

    pub async fn switch_to_default_content(&self) -> Result<()> {
        self.send(|responder| BrowserCommand::SwitchToDefaultContent { responder })
            .await
    }

    pub async fn network_log(&self) -> Result<Vec<NetworkEvent>> {
        self.send(|responder| BrowserCommand::NetworkLog { responder })
            .await
    }

    pub async fn console_log(&self) -> Result<Vec<ConsoleEntry>> {
        self.send(|responder| BrowserCommand::ConsoleLog { responder })
            .await
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.send(|responder| BrowserCommand::Screenshot { responder })
            .await
    }

    /// Quit the browser and stop the actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(|responder| BrowserCommand::Shutdown { responder })
            .await
    }
}
