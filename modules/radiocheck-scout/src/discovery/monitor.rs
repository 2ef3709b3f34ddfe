use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::actor::{BrowserActor, BrowserHandle};
use super::browser::{BrowserLauncher, NetworkEvent};
use super::heuristics::looks_like_audio;
use crate::verification::classifier::is_passive_audio_content_type;

/// Stream URLs seen in a session's network traffic.
///
/// `observed` holds requests that look like audio; `confirmed` holds
/// responses that actually carried an audio content type. Every confirmed
/// URL is also observed.
#[derive(Default)]
pub struct PassiveSignals {
    observed: Mutex<HashSet<String>>,
    confirmed: Mutex<HashSet<String>>,
}

impl PassiveSignals {
    pub fn record(&self, event: &NetworkEvent) {
        match event {
            NetworkEvent::RequestWillBeSent { url } => {
                if looks_like_audio(url) {
                    lock(&self.observed).insert(url.clone());
                }
            }
            NetworkEvent::ResponseReceived { url, content_type } => {
                if is_passive_audio_content_type(content_type) {
                    if lock(&self.confirmed).insert(url.clone()) {
                        info!(url = url.as_str(), content_type = content_type.as_str(), "Stream confirmed by network traffic");
                    }
                    lock(&self.observed).insert(url.clone());
                }
            }
        }
    }

    pub fn observed(&self) -> Vec<String> {
        let mut urls: Vec<String> = lock(&self.observed).iter().cloned().collect();
        urls.sort();
        urls
    }

    pub fn confirmed(&self) -> Vec<String> {
        let mut urls: Vec<String> = lock(&self.confirmed).iter().cloned().collect();
        urls.sort();
        urls
    }

    pub fn has_confirmed(&self) -> bool {
        !lock(&self.confirmed).is_empty()
    }
}

fn lock(set: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}

/// Background poll of the browser's network log into [`PassiveSignals`].
pub struct NetworkMonitor {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    pub fn start(browser: BrowserHandle, signals: Arc<PassiveSignals>, every: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        match browser.network_log().await {
                            Ok(events) => events.iter().for_each(|e| signals.record(e)),
                            Err(_) if browser.is_closed() => {
                                debug!("Browser actor gone, network monitor stopping");
                                break;
                            }
                            Err(e) => warn!(error = %e, "Network log poll failed, retrying next tick"),
                        }
                    }
                }
            }
        });
        Self { stop, task }
    }

    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

/// One station's browser: the actor handle, its passive signals, and the
/// monitor feeding them. Dropped state is cleaned up by [`DiscoverySession::close`].
pub struct DiscoverySession {
    pub browser: BrowserHandle,
    pub signals: Arc<PassiveSignals>,
    monitor: NetworkMonitor,
    stabilization: Duration,
}

impl DiscoverySession {
    pub async fn open(
        launcher: &dyn BrowserLauncher,
        poll_interval: Duration,
        stabilization: Duration,
    ) -> Result<Self> {
        let driver = launcher.launch().await?;
        let browser = BrowserActor::spawn(driver);
        let signals = Arc::new(PassiveSignals::default());
        let monitor = NetworkMonitor::start(browser.clone(), signals.clone(), poll_interval);
        Ok(Self {
            browser,
            signals,
            monitor,
            stabilization,
        })
    }

    /// Pull pending network events into the signals now instead of waiting
    /// for the next monitor tick.
    pub async fn refresh(&self) {
        match self.browser.network_log().await {
            Ok(events) => events.iter().for_each(|e| self.signals.record(e)),
            Err(e) => debug!(error = %e, "Network log refresh failed"),
        }
    }

    /// Wait up to `budget` for a stream confirmed after `already` was taken.
    /// On the first such confirmation, wait the stabilization delay and
    /// return everything newly confirmed by then.
    pub async fn wait_for_confirmed(
        &self,
        budget: Duration,
        poll: Duration,
        already: &[String],
    ) -> Vec<String> {
        let deadline = Instant::now() + budget;
        let fresh = |urls: Vec<String>| -> Vec<String> {
            urls.into_iter().filter(|u| !already.contains(u)).collect()
        };
        loop {
            self.refresh().await;
            if !fresh(self.signals.confirmed()).is_empty() {
                tokio::time::sleep(self.stabilization).await;
                self.refresh().await;
                return fresh(self.signals.confirmed());
            }
            if Instant::now() >= deadline {
                return Vec::new();
            }
            tokio::time::sleep(poll.max(Duration::from_millis(1))).await;
        }
    }

    pub async fn close(self) {
        self.monitor.stop().await;
        if let Err(e) = self.browser.shutdown().await {
            warn!(error = %e, "Browser shutdown failed");
        }
    }
}
