//! Page-level stream extraction.
//!
//! Given a page URL and a live [`DiscoverySession`], find stream URLs the
//! page plays and return the ones that pass strict validation. Nested
//! contexts (popup windows opened by play controls, player iframes) are
//! walked with an explicit frontier stack bounded by [`MAX_CONTEXT_DEPTH`].

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{stream, StreamExt};
use radiocheck_common::DiscoveryTimings;
use regex::Regex;
use tracing::{debug, info, warn};

use super::browser::ElementHandle;
use super::heuristics::looks_like_audio;
use super::monitor::DiscoverySession;
use super::normalizer::UrlNormalizer;
use crate::infra::util::truncate_chars;
use crate::verification::{classify_strict, StreamHttp};

/// Document is depth 0; a popup or iframe is one deeper.
pub const MAX_CONTEXT_DEPTH: usize = 2;

const VALIDATION_CONCURRENCY: usize = 5;
const CONSOLE_MESSAGE_MAX: usize = 150;

const MEDIA_TAGS: &[&str] = &["audio", "video", "source", "object", "embed"];
const MEDIA_ATTRIBUTES: &[&str] = &["src", "data", "value"];

const FRAME_KEYWORDS: &[&str] = &[
    "player", "stream", "listen", "radio", "vivo", "embed", "cast", "media",
];

/// Play-like controls, most specific first.
pub const PLAY_SELECTORS: &[&str] = &[
    "button#play_pause_button",
    "#play_pause_button",
    "[class*=\"play\"]",
    "[class*=\"Play\"]",
    "[class*=\"PLAY\"]",
    "[class*=\"player\"]",
    "[class*=\"Player\"]",
    "[class*=\"btn-play\"]",
    "[class*=\"playButton\"]",
    "[class*=\"play-button\"]",
    "[class*=\"btnPlay\"]",
    "[class*=\"PlayBtn\"]",
    "[id*=\"play\"]",
    "[id*=\"Play\"]",
    "[id*=\"player\"]",
    "[id*=\"btnPlay\"]",
    "[id*=\"playBtn\"]",
    "[aria-label*=\"play\" i]",
    "[aria-label*=\"reproducir\" i]",
    "[aria-label*=\"Play\" i]",
    "[aria-label*=\"Reproducir\" i]",
    "[title*=\"play\" i]",
    "[title*=\"reproducir\" i]",
    "button[class*=\"icon-play\"]",
    "button[class*=\"fa-play\"]",
    "div[class*=\"icon-play\"]",
    "div[class*=\"fa-play\"]",
    "svg[class*=\"play\"]",
    "svg[aria-label*=\"play\" i]",
    ".player-button",
    ".audio-player button",
    ".radio-player button",
    ".stream-button",
    ".live-button",
    ".online-button",
    "div[onclick*=\"play\"]",
    "div[onclick*=\"stream\"]",
    "a[href*=\"play\"]",
    "a[href*=\"stream\"]",
];

const POPUP_SELECTOR: &str = "[onclick*=\"openPopUp\"]";

static POPUP_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"openPopUp\(['"]([^'"]+)['"]\)"#).expect("valid regex"));

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Host of the station directory; its pages get the long passive wait.
    pub directory_host: String,
    /// Base of the directory's embed player, `{base}/{id}`.
    pub directory_embed_url: String,
    pub validation_timeout: Duration,
    pub timings: DiscoveryTimings,
}

#[derive(Debug, Clone)]
struct Frame {
    element: ElementHandle,
    src: String,
}

enum Step {
    Visit {
        window: String,
        frame: Option<Frame>,
        depth: usize,
    },
    ClosePopup {
        handle: String,
        return_to: String,
    },
}

/// What one interaction round produced.
#[derive(Default)]
struct Interaction {
    found: Vec<String>,
    popup: Option<String>,
}

pub struct PageExtractor {
    http: Arc<dyn StreamHttp>,
    normalizer: UrlNormalizer,
    settings: ExtractorSettings,
}

impl PageExtractor {
    pub fn new(http: Arc<dyn StreamHttp>, settings: ExtractorSettings) -> Self {
        let normalizer = UrlNormalizer::new(http.clone());
        Self {
            http,
            normalizer,
            settings,
        }
    }

    /// Visit `page_url` and return validated stream URLs, best first.
    /// An empty list means nothing on the page passed validation.
    pub async fn extract(&self, session: &DiscoverySession, page_url: &str) -> Result<Vec<String>> {
        let browser = &session.browser;
        info!(url = page_url, "Extracting streams from page");
        session.refresh().await;
        let already_confirmed = session.signals.confirmed();
        browser
            .navigate(page_url)
            .await
            .with_context(|| format!("Failed to open {page_url}"))?;

        let on_directory = self.is_directory_page(page_url);
        if on_directory && !page_url.contains("/embed/") {
            self.follow_directory_embed(session).await;
        }

        let t = &self.settings.timings;
        let budget = if on_directory { t.passive_wait } else { t.page_settle };
        let mut candidates = session
            .wait_for_confirmed(budget, t.poll_interval, &already_confirmed)
            .await;
        if !candidates.is_empty() {
            info!(count = candidates.len(), url = page_url, "Streams confirmed passively");
        } else {
            candidates = self.explore(session).await;
        }

        self.drain_console(session).await;
        Ok(self.finalize(candidates).await)
    }

    fn is_directory_page(&self, page_url: &str) -> bool {
        url::Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .is_some_and(|host| {
                let bare = |h: &str| h.trim_start_matches("www.").to_string();
                bare(&host) == bare(&self.settings.directory_host)
            })
    }

    /// Directory pages open their player in a popup. Go straight to the
    /// embed page the popup would load.
    async fn follow_directory_embed(&self, session: &DiscoverySession) {
        let browser = &session.browser;
        let Ok(elements) = browser.find_elements(POPUP_SELECTOR).await else {
            return;
        };
        for el in elements {
            let Ok(Some(onclick)) = browser.attribute(&el, "onclick").await else {
                continue;
            };
            let Some(caps) = POPUP_ID_RE.captures(&onclick) else {
                continue;
            };
            let embed = format!(
                "{}/{}",
                self.settings.directory_embed_url.trim_end_matches('/'),
                &caps[1]
            );
            info!(url = embed.as_str(), "Following directory embed player");
            if let Err(e) = browser.navigate(&embed).await {
                warn!(url = embed.as_str(), error = %e, "Embed navigation failed");
            }
            return;
        }
    }

    /// Walk the document, popups and player iframes until something turns up.
    async fn explore(&self, session: &DiscoverySession) -> Vec<String> {
        let browser = &session.browser;
        let root = match browser.current_window().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "No current window, skipping page exploration");
                return Vec::new();
            }
        };

        let mut frontier = vec![Step::Visit {
            window: root.clone(),
            frame: None,
            depth: 0,
        }];
        let mut visited: HashSet<String> = HashSet::new();
        let mut found: Vec<String> = Vec::new();

        while let Some(step) = frontier.pop() {
            match step {
                Step::ClosePopup { handle, return_to } => {
                    self.close_popup(session, &handle, &return_to).await;
                }
                Step::Visit { .. } if !found.is_empty() => {}
                Step::Visit {
                    window,
                    frame,
                    depth,
                } => {
                    match self
                        .visit(session, &window, frame.as_ref(), depth, &mut visited, &mut frontier)
                        .await
                    {
                        Ok(urls) => found.extend(urls),
                        Err(e) => {
                            warn!(window = window.as_str(), depth, error = %e, "Context exploration aborted");
                        }
                    }
                }
            }
        }

        if let Err(e) = browser.switch_window(&root).await {
            debug!(error = %e, "Could not return to the main window");
        }
        if let Err(e) = browser.switch_to_default_content().await {
            debug!(error = %e, "Could not return to the top document");
        }
        found
    }

    async fn visit(
        &self,
        session: &DiscoverySession,
        window: &str,
        frame: Option<&Frame>,
        depth: usize,
        visited: &mut HashSet<String>,
        frontier: &mut Vec<Step>,
    ) -> Result<Vec<String>> {
        let browser = &session.browser;
        let t = &self.settings.timings;
        browser.switch_window(window).await?;
        browser.switch_to_default_content().await?;

        let key = match frame {
            Some(f) => {
                browser.switch_to_frame(&f.element).await?;
                tokio::time::sleep(t.frame_settle).await;
                format!("frame:{}", f.src)
            }
            None => format!("window:{}", browser.current_url().await?),
        };
        if !visited.insert(key) {
            return Ok(Vec::new());
        }
        debug!(window, depth, in_frame = frame.is_some(), "Exploring browsing context");

        let mut found = self.scan(session).await;
        if !found.is_empty() {
            return Ok(found);
        }

        let interaction = self.interact(session).await;
        found = interaction.found;

        // Frontier is LIFO: frames go in first so a popup opened here is
        // explored before them.
        if found.is_empty() && frame.is_none() && depth < MAX_CONTEXT_DEPTH {
            browser.switch_window(window).await?;
            browser.switch_to_default_content().await?;
            for frame in self.player_frames(session).await.into_iter().rev() {
                frontier.push(Step::Visit {
                    window: window.to_string(),
                    frame: Some(frame),
                    depth: depth + 1,
                });
            }
        }

        if let Some(popup) = interaction.popup {
            if depth < MAX_CONTEXT_DEPTH {
                frontier.push(Step::ClosePopup {
                    handle: popup.clone(),
                    return_to: window.to_string(),
                });
                frontier.push(Step::Visit {
                    window: popup,
                    frame: None,
                    depth: depth + 1,
                });
            } else {
                self.close_popup(session, &popup, window).await;
            }
        }
        Ok(found)
    }

    /// Observed network URLs plus media element sources that look like audio.
    async fn scan(&self, session: &DiscoverySession) -> Vec<String> {
        let browser = &session.browser;
        session.refresh().await;
        let mut found = session.signals.observed();
        for tag in MEDIA_TAGS {
            let Ok(elements) = browser.find_elements(tag).await else {
                continue;
            };
            for el in elements {
                for attr in MEDIA_ATTRIBUTES {
                    if let Ok(Some(value)) = browser.attribute(&el, attr).await {
                        if looks_like_audio(&value) && !found.contains(&value) {
                            found.push(value);
                        }
                    }
                }
            }
        }
        found
    }

    /// Press play-like controls until a stream shows up, a popup opens, or
    /// the interaction cap is reached.
    async fn interact(&self, session: &DiscoverySession) -> Interaction {
        let browser = &session.browser;
        let t = &self.settings.timings;
        let windows_before = browser.window_handles().await.unwrap_or_default();
        let mut attempts = 0;

        for selector in PLAY_SELECTORS {
            let Ok(elements) = browser.find_elements(selector).await else {
                continue;
            };
            for el in elements {
                if attempts >= t.max_interactions {
                    debug!(attempts, "Interaction cap reached");
                    return Interaction::default();
                }
                if !browser.is_displayed(&el).await.unwrap_or(false) {
                    continue;
                }
                attempts += 1;
                if let Err(e) = self.activate(session, &el).await {
                    debug!(selector, error = %e, "Play control did not respond");
                    continue;
                }
                tokio::time::sleep(t.interaction_settle).await;

                let found = self.scan(session).await;
                let windows = browser.window_handles().await.unwrap_or_default();
                let popup = windows
                    .iter()
                    .rev()
                    .find(|h| !windows_before.contains(h))
                    .cloned();
                if popup.is_some() || !found.is_empty() {
                    info!(selector, found = found.len(), popup = popup.is_some(), "Play control produced results");
                    return Interaction { found, popup };
                }
            }
        }
        Interaction::default()
    }

    /// Run the control's popup handler directly when it has one, else click.
    async fn activate(&self, session: &DiscoverySession, el: &ElementHandle) -> Result<()> {
        let browser = &session.browser;
        let onclick = browser.attribute(el, "onclick").await.ok().flatten().unwrap_or_default();
        if onclick.contains("openPopUp") || onclick.contains("window.open") {
            return browser.execute_script(&onclick.replace("return ", ""), Vec::new()).await;
        }
        if browser.click(el).await.is_err() {
            browser
                .execute_script("arguments[0].click();", vec![el.clone()])
                .await?;
        }
        Ok(())
    }

    async fn player_frames(&self, session: &DiscoverySession) -> Vec<Frame> {
        let browser = &session.browser;
        let Ok(frames) = browser.find_elements("iframe").await else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for element in frames {
            let Ok(Some(src)) = browser.attribute(&element, "src").await else {
                continue;
            };
            let lower = src.to_lowercase();
            if FRAME_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                out.push(Frame { element, src });
            }
        }
        out
    }

    async fn close_popup(&self, session: &DiscoverySession, handle: &str, return_to: &str) {
        let browser = &session.browser;
        let closed = async {
            browser.switch_window(handle).await?;
            browser.close_window().await?;
            browser.switch_window(return_to).await
        };
        if let Err(e) = closed.await {
            warn!(handle, error = %e, "Popup cleanup failed");
        }
    }

    async fn drain_console(&self, session: &DiscoverySession) {
        match session.browser.console_log().await {
            Ok(entries) => {
                for entry in entries {
                    debug!(
                        level = entry.level.as_str(),
                        message = truncate_chars(&entry.message, CONSOLE_MESSAGE_MAX).as_str(),
                        "Browser console"
                    );
                }
            }
            Err(e) => debug!(error = %e, "Console log unavailable"),
        }
    }

    /// Dedupe, normalize, dedupe again, then keep what passes strict validation.
    async fn finalize(&self, candidates: Vec<String>) -> Vec<String> {
        let candidates = dedupe(candidates);
        let mut normalized = Vec::with_capacity(candidates.len());
        for url in &candidates {
            normalized.push(self.normalizer.normalize(url).await);
        }
        let normalized = dedupe(normalized);

        let timeout = self.settings.validation_timeout;
        let checks: Vec<(String, bool)> = stream::iter(normalized)
            .map(|url| async move {
                let ok = classify_strict(&self.http.probe(&url, timeout).await);
                (url, ok)
            })
            .buffered(VALIDATION_CONCURRENCY)
            .collect()
            .await;

        let valid: Vec<String> = checks
            .into_iter()
            .filter_map(|(url, ok)| {
                if !ok {
                    debug!(url = url.as_str(), "Candidate failed strict validation");
                }
                ok.then_some(url)
            })
            .collect();
        info!(candidates = candidates.len(), valid = valid.len(), "Page candidates validated");
        valid
    }
}

fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_id_is_extracted() {
        let caps = POPUP_ID_RE
            .captures("return openPopUp('radio-mitre-am-790');")
            .expect("should match");
        assert_eq!(&caps[1], "radio-mitre-am-790");
        assert!(POPUP_ID_RE.captures("openPopUp(id)").is_none());
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let urls = vec!["b".to_string(), "a".into(), "b".into()];
        assert_eq!(dedupe(urls), vec!["b".to_string(), "a".into()]);
    }
}
