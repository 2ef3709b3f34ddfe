// Test mocks for the verification and discovery engines.
//
// Four mocks matching the four trait boundaries:
// - MockHttp (StreamHttp): HashMap-based URL→ProbeObservation, records calls
// - MockBrowser (BrowserDriver): scripted pages, windows and frames
// - MockLauncher (BrowserLauncher): hands out a shared MockBrowser, counts launches
// - MockRegistry (StationRegistry): HashMap-based name→stations
//
// Plus helpers for building configs and registry records.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use radiocheck_common::{Config, DiscoveryTimings};
use serde_json::Value;

use crate::discovery::browser::{
    BrowserDriver, BrowserLauncher, ConsoleEntry, ElementHandle, NetworkEvent,
};
use crate::discovery::registry::{RegistryStation, StationRegistry};
use crate::verification::{ProbeObservation, StreamHttp};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Default config with near-zero discovery waits and no browser warm-up.
pub fn test_config() -> Config {
    Config {
        timings: DiscoveryTimings::instant(),
        ..Config::default()
    }
}

pub fn registry_station(name: &str, url: &str) -> RegistryStation {
    RegistryStation {
        name: name.to_string(),
        url: url.to_string(),
        url_resolved: url.to_string(),
    }
}

/// A probe result strict validation accepts.
pub fn audio(content_type: &str) -> ProbeObservation {
    ProbeObservation::ok(200, content_type)
}

// ---------------------------------------------------------------------------
// MockHttp
// ---------------------------------------------------------------------------

/// HashMap-based HTTP layer. Unregistered probes fail as transport errors,
/// unregistered sites do not exist, unregistered JSON is an error.
/// Builder pattern: `.on_probe()`, `.on_site()`, `.on_json()`.
#[derive(Default)]
pub struct MockHttp {
    probes: HashMap<String, ProbeObservation>,
    sites: HashSet<String>,
    json: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_probe(mut self, url: &str, observation: ProbeObservation) -> Self {
        self.probes.insert(url.to_string(), observation);
        self
    }

    pub fn on_site(mut self, url: &str) -> Self {
        self.sites.insert(url.to_string());
        self
    }

    pub fn on_json(mut self, url: &str, body: Value) -> Self {
        self.json.insert(url.to_string(), body);
        self
    }

    /// Every URL probed, in call order.
    pub fn probed(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn probe_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl StreamHttp for MockHttp {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeObservation {
        self.calls.lock().unwrap().push(url.to_string());
        self.probes.get(url).cloned().unwrap_or_else(|| {
            ProbeObservation::Transport(format!("MockHttp: no probe registered for {url}"))
        })
    }

    async fn site_exists(&self, url: &str, _timeout: Duration) -> bool {
        self.sites.contains(url)
    }

    async fn get_json(&self, url: &str, _timeout: Duration) -> Result<Value> {
        self.json
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("MockHttp: no JSON registered for {url}"))
    }
}

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

/// What happens when an element is clicked (or its onclick script runs).
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// The page starts a request or receives a response.
    Network(NetworkEvent),
    /// A new window opens on this URL.
    OpenWindow(String),
}

#[derive(Debug, Clone)]
pub struct MockElement {
    id: String,
    attrs: HashMap<String, String>,
    text: String,
    displayed: bool,
    effects: Vec<ClickEffect>,
    children: Vec<(String, MockElement)>,
}

impl MockElement {
    /// `id` must be unique across everything registered on one browser.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            attrs: HashMap::new(),
            text: String::new(),
            displayed: true,
            effects: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn child(mut self, css: &str, child: MockElement) -> Self {
        self.children.push((css.to_string(), child));
        self
    }
}

/// A page: elements keyed by the exact CSS selector that finds them, plus
/// network and console entries emitted when the page loads.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    elements: Vec<(String, MockElement)>,
    network: Vec<NetworkEvent>,
    console: Vec<String>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, css: &str, element: MockElement) -> Self {
        self.elements.push((css.to_string(), element));
        self
    }

    pub fn network(mut self, event: NetworkEvent) -> Self {
        self.network.push(event);
        self
    }

    pub fn console(mut self, message: &str) -> Self {
        self.console.push(message.to_string());
        self
    }
}

struct BrowserState {
    pages: HashMap<String, MockPage>,
    elements: HashMap<String, MockElement>,
    windows: Vec<(String, String)>,
    current: String,
    frame: Option<String>,
    pending_network: Vec<NetworkEvent>,
    pending_console: Vec<ConsoleEntry>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    scripts: Vec<String>,
    quits: usize,
    opened: usize,
    network_failures: usize,
}

impl BrowserState {
    fn page_url(&self) -> String {
        if let Some(frame) = &self.frame {
            return frame.clone();
        }
        self.windows
            .iter()
            .find(|(h, _)| *h == self.current)
            .map(|(_, url)| url.clone())
            .unwrap_or_default()
    }

    fn load(&mut self, url: &str) {
        if let Some(page) = self.pages.get(url) {
            self.pending_network.extend(page.network.iter().cloned());
            let entries: Vec<ConsoleEntry> = page
                .console
                .iter()
                .map(|m| ConsoleEntry {
                    level: "INFO".to_string(),
                    message: m.clone(),
                    timestamp_ms: 0,
                })
                .collect();
            self.pending_console.extend(entries);
        }
    }

    fn element(&self, handle: &ElementHandle) -> Result<MockElement> {
        self.elements
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| anyhow!("MockBrowser: stale element {}", handle.0))
    }

    fn apply(&mut self, effects: &[ClickEffect]) {
        for effect in effects {
            match effect {
                ClickEffect::Network(event) => self.pending_network.push(event.clone()),
                ClickEffect::OpenWindow(url) => {
                    self.opened += 1;
                    self.windows.push((format!("popup-{}", self.opened), url.clone()));
                    self.load(url);
                }
            }
        }
    }
}

/// Scripted browser. Clones share state, so a test keeps one clone to
/// inspect what the engine did with the other.
/// Builder pattern: `.on_page()`.
#[derive(Clone)]
pub struct MockBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrowserState {
                pages: HashMap::new(),
                elements: HashMap::new(),
                windows: vec![("main".to_string(), "about:blank".to_string())],
                current: "main".to_string(),
                frame: None,
                pending_network: Vec::new(),
                pending_console: Vec::new(),
                navigations: Vec::new(),
                clicks: Vec::new(),
                scripts: Vec::new(),
                quits: 0,
                opened: 0,
                network_failures: 0,
            })),
        }
    }

    pub fn on_page(self, url: &str, page: MockPage) -> Self {
        {
            let mut state = self.lock();
            let mut stack: Vec<MockElement> = page.elements.iter().map(|(_, e)| e.clone()).collect();
            while let Some(el) = stack.pop() {
                stack.extend(el.children.iter().map(|(_, c)| c.clone()));
                state.elements.insert(el.id.clone(), el);
            }
            state.pages.insert(url.to_string(), page);
        }
        self
    }

    /// The next `n` network log reads fail without draining pending events.
    pub fn fail_network_logs(self, n: usize) -> Self {
        self.lock().network_failures = n;
        self
    }

    /// Queue a network event as if the page had just emitted it.
    pub fn emit(&self, event: NetworkEvent) {
        self.lock().pending_network.push(event);
    }

    fn lock(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    pub fn quit_count(&self) -> usize {
        self.lock().quits
    }

    pub fn open_windows(&self) -> Vec<String> {
        self.lock().windows.iter().map(|(h, _)| h.clone()).collect()
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.navigations.push(url.to_string());
        state.frame = None;
        let current = state.current.clone();
        match state.windows.iter_mut().find(|(h, _)| *h == current) {
            Some(window) => window.1 = url.to_string(),
            None => bail!("MockBrowser: no current window"),
        }
        state.load(url);
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        let state = self.lock();
        state
            .windows
            .iter()
            .find(|(h, _)| *h == state.current)
            .map(|(_, url)| url.clone())
            .ok_or_else(|| anyhow!("MockBrowser: no current window"))
    }

    async fn find_elements(&mut self, css: &str) -> Result<Vec<ElementHandle>> {
        let state = self.lock();
        let url = state.page_url();
        Ok(state
            .pages
            .get(&url)
            .map(|page| {
                page.elements
                    .iter()
                    .filter(|(selector, _)| selector == css)
                    .map(|(_, el)| ElementHandle(el.id.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_child_elements(
        &mut self,
        parent: &ElementHandle,
        css: &str,
    ) -> Result<Vec<ElementHandle>> {
        let parent = self.lock().element(parent)?;
        Ok(parent
            .children
            .iter()
            .filter(|(selector, _)| selector == css)
            .map(|(_, el)| ElementHandle(el.id.clone()))
            .collect())
    }

    async fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        Ok(self.lock().element(element)?.attrs.get(name).cloned())
    }

    async fn text(&mut self, element: &ElementHandle) -> Result<String> {
        Ok(self.lock().element(element)?.text)
    }

    async fn is_displayed(&mut self, element: &ElementHandle) -> Result<bool> {
        Ok(self.lock().element(element)?.displayed)
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        let mut state = self.lock();
        let el = state.element(element)?;
        state.clicks.push(el.id.clone());
        state.apply(&el.effects);
        Ok(())
    }

    async fn execute_script(&mut self, script: &str, args: Vec<ElementHandle>) -> Result<()> {
        let mut state = self.lock();
        state.scripts.push(script.to_string());
        let targets: Vec<MockElement> = if script == "arguments[0].click();" {
            args.iter().map(|a| state.element(a)).collect::<Result<_>>()?
        } else {
            // An onclick handler run directly.
            state
                .elements
                .values()
                .filter(|el| {
                    el.attrs
                        .get("onclick")
                        .is_some_and(|h| h.replace("return ", "") == script)
                })
                .cloned()
                .collect()
        };
        for el in targets {
            state.apply(&el.effects);
        }
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<String>> {
        Ok(self.open_windows())
    }

    async fn current_window(&mut self) -> Result<String> {
        Ok(self.lock().current.clone())
    }

    async fn switch_window(&mut self, handle: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.windows.iter().any(|(h, _)| h == handle) {
            bail!("MockBrowser: no such window {handle}");
        }
        state.current = handle.to_string();
        state.frame = None;
        Ok(())
    }

    async fn close_window(&mut self) -> Result<()> {
        let mut state = self.lock();
        let current = state.current.clone();
        state.windows.retain(|(h, _)| *h != current);
        state.frame = None;
        Ok(())
    }

    async fn switch_to_frame(&mut self, frame: &ElementHandle) -> Result<()> {
        let mut state = self.lock();
        let src = state
            .element(frame)?
            .attrs
            .get("src")
            .cloned()
            .ok_or_else(|| anyhow!("MockBrowser: frame {} has no src", frame.0))?;
        state.frame = Some(src);
        Ok(())
    }

    async fn switch_to_default_content(&mut self) -> Result<()> {
        self.lock().frame = None;
        Ok(())
    }

    async fn network_log(&mut self) -> Result<Vec<NetworkEvent>> {
        let mut state = self.lock();
        if state.network_failures > 0 {
            state.network_failures -= 1;
            bail!("MockBrowser: network log unavailable");
        }
        Ok(std::mem::take(&mut state.pending_network))
    }

    async fn console_log(&mut self) -> Result<Vec<ConsoleEntry>> {
        Ok(std::mem::take(&mut self.lock().pending_console))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn quit(&mut self) -> Result<()> {
        self.lock().quits += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockLauncher
// ---------------------------------------------------------------------------

/// Hands out clones of one MockBrowser. `failing()` never launches.
pub struct MockLauncher {
    browser: Option<MockBrowser>,
    launches: AtomicUsize,
}

impl MockLauncher {
    pub fn new(browser: MockBrowser) -> Self {
        Self {
            browser: Some(browser),
            launches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            browser: None,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserDriver>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match &self.browser {
            Some(browser) => Ok(Box::new(browser.clone())),
            None => bail!("MockLauncher: browser unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockRegistry
// ---------------------------------------------------------------------------

/// HashMap-based registry keyed by the exact search name. Unknown names
/// return no stations.
#[derive(Default)]
pub struct MockRegistry {
    results: HashMap<String, Vec<RegistryStation>>,
    searches: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, name: &str, stations: Vec<RegistryStation>) -> Self {
        self.results.insert(name.to_string(), stations);
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl StationRegistry for MockRegistry {
    async fn search(&self, name: &str) -> Result<Vec<RegistryStation>> {
        self.searches.lock().unwrap().push(name.to_string());
        Ok(self.results.get(name).cloned().unwrap_or_default())
    }
}
