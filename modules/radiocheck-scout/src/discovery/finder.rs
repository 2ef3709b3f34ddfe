use std::sync::Arc;

use anyhow::{Context, Result};
use radiocheck_common::{CandidateOrigin, Config, FoundStream, Station};
use serde::Serialize;
use tracing::{info, warn};

use super::browser::BrowserLauncher;
use super::extractor::{ExtractorSettings, PageExtractor};
use super::heuristics::looks_like_audio;
use super::monitor::DiscoverySession;
use super::prioritizer::Prioritizer;
use super::registry::StationRegistry;
use super::stages::{candidate_site_urls, find_directory_page, search_query, web_search};
use crate::infra::util::registry_search_name;
use crate::verification::{classify_strict, StreamHttp};

/// Web-search candidates kept after prioritization.
const MAX_SEARCH_CANDIDATES: usize = 5;

/// Cascade stages in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Registry,
    Directory,
    WebSearch,
    PatternGuess,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Registry => Some(Stage::Directory),
            Stage::Directory => Some(Stage::WebSearch),
            Stage::WebSearch => Some(Stage::PatternGuess),
            Stage::PatternGuess => None,
        }
    }

    pub fn origin(self) -> CandidateOrigin {
        match self {
            Stage::Registry => CandidateOrigin::RegistryApi,
            Stage::Directory => CandidateOrigin::Directory,
            Stage::WebSearch => CandidateOrigin::WebSearch,
            Stage::PatternGuess => CandidateOrigin::PatternGuess,
        }
    }

    pub fn needs_browser(self) -> bool {
        !matches!(self, Stage::Registry)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.origin().fmt(f)
    }
}

enum CascadeState {
    Try(Stage),
    Found(FoundStream),
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub found: bool,
    pub error: Option<String>,
}

/// Result of running the cascade for one station.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub station: Station,
    pub found: Option<FoundStream>,
    pub stages_tried: Vec<StageReport>,
    pub last_error: Option<String>,
}

impl DiscoveryOutcome {
    /// Outcome for a unit that never produced a report, e.g. a panicked task.
    pub fn failed(station: Station, error: impl Into<String>) -> Self {
        Self {
            station,
            found: None,
            stages_tried: Vec::new(),
            last_error: Some(error.into()),
        }
    }
}

/// Runs the discovery cascade for one station at a time. Each call owns
/// its own browser session, opened on first use and closed before return.
pub struct StreamFinder {
    config: Config,
    http: Arc<dyn StreamHttp>,
    registry: Arc<dyn StationRegistry>,
    launcher: Arc<dyn BrowserLauncher>,
    extractor: PageExtractor,
    prioritizer: Prioritizer,
}

impl StreamFinder {
    pub fn new(
        config: &Config,
        http: Arc<dyn StreamHttp>,
        registry: Arc<dyn StationRegistry>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        let directory_host = url::Url::parse(&config.directory_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_default();
        let extractor = PageExtractor::new(
            http.clone(),
            ExtractorSettings {
                directory_host,
                directory_embed_url: config.directory_embed_url.clone(),
                validation_timeout: config.validation_timeout,
                timings: config.timings,
            },
        );
        Self {
            config: config.clone(),
            http,
            registry,
            launcher,
            extractor,
            prioritizer: Prioritizer::new(config.local_tlds.clone()),
        }
    }

    pub async fn discover(&self, station: Station) -> DiscoveryOutcome {
        info!(station = station.name.as_str(), url = station.url.as_str(), "Searching for replacement stream");
        let mut session: Option<DiscoverySession> = None;
        let mut stages_tried = Vec::new();
        let mut last_error = None;
        let mut state = CascadeState::Try(Stage::Registry);

        let found = loop {
            match state {
                CascadeState::Try(stage) => {
                    let result = self.run_stage(stage, &station, &mut session).await;
                    let (found, error) = match result {
                        Ok(found) => (found, None),
                        Err(e) => {
                            warn!(station = station.name.as_str(), stage = %stage, error = %e, "Stage failed, continuing");
                            (None, Some(format!("{e:#}")))
                        }
                    };
                    stages_tried.push(StageReport {
                        stage,
                        found: found.is_some(),
                        error: error.clone(),
                    });
                    if error.is_some() {
                        last_error = error;
                    }
                    state = match found {
                        Some(url) => CascadeState::Found(FoundStream {
                            url,
                            origin: stage.origin(),
                        }),
                        None => stage.next().map_or(CascadeState::Exhausted, CascadeState::Try),
                    };
                }
                CascadeState::Found(found) => break Some(found),
                CascadeState::Exhausted => break None,
            }
        };

        if let Some(session) = session {
            session.close().await;
        }
        if found.is_none() {
            info!(station = station.name.as_str(), stages = stages_tried.len(), "Cascade exhausted");
        }
        DiscoveryOutcome {
            station,
            found,
            stages_tried,
            last_error,
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        station: &Station,
        slot: &mut Option<DiscoverySession>,
    ) -> Result<Option<String>> {
        if !stage.needs_browser() {
            return self.try_registry(station).await;
        }
        let session = self.session(slot).await?;
        match stage {
            Stage::Registry => Ok(None),
            Stage::Directory => self.try_directory(station, session).await,
            Stage::WebSearch => self.try_web_search(station, session).await,
            Stage::PatternGuess => self.try_pattern_guess(station, session).await,
        }
    }

    async fn session<'s>(&self, slot: &'s mut Option<DiscoverySession>) -> Result<&'s DiscoverySession> {
        if slot.is_none() {
            let t = &self.config.timings;
            let session =
                DiscoverySession::open(self.launcher.as_ref(), t.poll_interval, t.stabilization)
                    .await
                    .context("Browser unavailable")?;
            *slot = Some(session);
        }
        slot.as_ref().context("Browser session missing")
    }

    async fn verify_strict(&self, url: &str) -> bool {
        classify_strict(&self.http.probe(url, self.config.validation_timeout).await)
    }

    async fn try_registry(&self, station: &Station) -> Result<Option<String>> {
        let name = registry_search_name(&station.name);
        let results = self.registry.search(&name).await?;
        info!(name = name.as_str(), results = results.len(), "Registry lookup");
        for entry in &results {
            let Some(url) = entry.stream_url() else {
                continue;
            };
            if looks_like_audio(url) && self.verify_strict(url).await {
                info!(url, registry_name = entry.name.as_str(), "Registry stream verified");
                return Ok(Some(url.to_string()));
            }
        }
        Ok(None)
    }

    async fn try_directory(
        &self,
        station: &Station,
        session: &DiscoverySession,
    ) -> Result<Option<String>> {
        let t = &self.config.timings;
        let page = find_directory_page(
            &session.browser,
            &self.config.directory_url,
            &station.name,
            t.directory_results,
            t.poll_interval,
        )
        .await?;
        let Some(page) = page else {
            return Ok(None);
        };
        let streams = self.extractor.extract(session, &page).await?;
        Ok(streams.into_iter().next())
    }

    async fn try_web_search(
        &self,
        station: &Station,
        session: &DiscoverySession,
    ) -> Result<Option<String>> {
        let query = search_query(&station.name, &self.config.search_suffix);
        let hits = web_search(
            &session.browser,
            &self.config.search_url,
            &self.config.search_region,
            &query,
            self.config.timings.search_settle,
        )
        .await?;
        let candidates = self
            .prioritizer
            .prioritize(&station.name, &hits, MAX_SEARCH_CANDIDATES);

        for candidate in candidates {
            match self.extractor.extract(session, &candidate.url).await {
                Ok(streams) => {
                    if let Some(url) = streams.into_iter().next() {
                        return Ok(Some(url));
                    }
                }
                Err(e) => warn!(url = candidate.url.as_str(), error = %e, "Candidate page failed"),
            }
        }
        Ok(None)
    }

    async fn try_pattern_guess(
        &self,
        station: &Station,
        session: &DiscoverySession,
    ) -> Result<Option<String>> {
        for site in candidate_site_urls(&station.name, &self.config.local_tlds) {
            if !self
                .http
                .site_exists(&site, self.config.site_check_timeout)
                .await
            {
                continue;
            }
            info!(url = site.as_str(), "Guessed site exists");
            match self.extractor.extract(session, &site).await {
                Ok(streams) => {
                    if let Some(url) = streams.into_iter().next() {
                        return Ok(Some(url));
                    }
                }
                Err(e) => warn!(url = site.as_str(), error = %e, "Guessed site failed"),
            }
        }
        Ok(None)
    }
}
