use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use radiocheck_common::catalog::parse_catalog_with_header;
use radiocheck_common::{adjust_name_for_url, Config, OutcomeKind, StationUpdate};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use tracing::{info, warn};

use super::progress::{LogProgress, ProgressSink};
use super::stats::RunStats;
use crate::discovery::{discover_all, BrowserLauncher, DiscoveryReport, StationRegistry, StreamFinder};
use crate::infra::run_log::{EventKind, RunLog};
use crate::verification::{verify_all, HostCache, StreamHttp, VerificationReport, Verifier};

const CATALOG_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything one run produced.
pub struct RunOutput {
    /// The catalog with every update applied.
    pub document: String,
    pub updates: Vec<StationUpdate>,
    pub verification: VerificationReport,
    pub discovery: Option<DiscoveryReport>,
    pub stats: RunStats,
    pub log: RunLog,
}

/// One run's context: collaborators, config and the cancel flag. The host
/// cache is created per call to [`RadioCheck::run`], so runs never share it.
pub struct RadioCheck {
    config: Config,
    http: Arc<dyn StreamHttp>,
    registry: Arc<dyn StationRegistry>,
    launcher: Arc<dyn BrowserLauncher>,
    progress: Arc<dyn ProgressSink>,
    cancelled: Arc<AtomicBool>,
}

impl RadioCheck {
    pub fn new(
        config: Config,
        http: Arc<dyn StreamHttp>,
        registry: Arc<dyn StationRegistry>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            config,
            http,
            registry,
            launcher,
            progress: Arc::new(LogProgress),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Setting this flag stops new work from starting.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Verify every station in `catalog_text`, look for replacements for the
    /// dead ones, and render the updated catalog. Only an unparseable catalog
    /// is an error.
    pub async fn run(&self, catalog_text: &str, source: &str) -> Result<RunOutput> {
        let started = Instant::now();
        let mut log = RunLog::new();
        let mut stats = RunStats::default();

        let catalog = parse_catalog_with_header(catalog_text, &self.config.header_labels())
            .with_context(|| format!("Failed to parse catalog from {source}"))?;
        stats.stations = catalog.stations().len() as u32;
        log.log(EventKind::CatalogLoaded {
            source: source.to_string(),
            stations: catalog.stations().len(),
        });
        info!(run_id = %log.run_id, stations = stats.stations, source, "Catalog loaded");

        // --- Verification ---
        let cache = Arc::new(HostCache::new());
        let verifier = Verifier::new(self.http.clone(), cache, self.config.probe_timeout);
        let verification = verify_all(
            &verifier,
            catalog.stations().to_vec(),
            self.config.verify_concurrency,
            &self.cancelled,
            self.progress.as_ref(),
        )
        .await;

        let mut updates: Vec<StationUpdate> = Vec::new();
        for v in &verification.results {
            match v.outcome.kind() {
                OutcomeKind::Alive => stats.alive += 1,
                OutcomeKind::Dead => stats.dead += 1,
                OutcomeKind::Timeout => stats.timeout += 1,
            }
            if v.cached {
                stats.cache_hits += 1;
            }
            if v.renamed() {
                stats.renamed += 1;
                updates.push(StationUpdate {
                    line: v.station.line,
                    name: v.station.name.clone(),
                    old_url: v.station.url.clone(),
                    new_url: v.station.url.clone(),
                });
            }
            log.log(EventKind::StationVerified {
                line: v.station.line,
                name: v.station.name.clone(),
                url: v.station.url.clone(),
                outcome: v.outcome.kind().to_string(),
                detail: v.outcome.detail().to_string(),
                cached: v.cached,
            });
        }
        info!(
            alive = stats.alive,
            dead = stats.dead,
            timeout = stats.timeout,
            cache_hits = stats.cache_hits,
            "Verification summary"
        );

        // --- Discovery ---
        let mut discovery = None;
        if verification.cancelled {
            log.log(EventKind::Cancelled {
                phase: "verification".to_string(),
            });
        } else if self.config.auto_discover {
            let dead = verification.needing_discovery();
            if !dead.is_empty() {
                stats.discovery_attempted = dead.len() as u32;
                let finder = Arc::new(StreamFinder::new(
                    &self.config,
                    self.http.clone(),
                    self.registry.clone(),
                    self.launcher.clone(),
                ));
                let report = discover_all(
                    finder,
                    dead,
                    self.config.discovery_concurrency,
                    &self.cancelled,
                    self.progress.as_ref(),
                )
                .await;
                self.record_discovery(&report, &mut updates, &mut stats, &mut log);
                if report.cancelled {
                    log.log(EventKind::Cancelled {
                        phase: "discovery".to_string(),
                    });
                }
                discovery = Some(report);
            }
        }

        stats.cancelled = self.cancelled.load(Ordering::Relaxed);
        let document = catalog.render(&updates);
        stats.updates_written = updates.len() as u32;
        stats.elapsed = started.elapsed();

        Ok(RunOutput {
            document,
            updates,
            verification,
            discovery,
            stats,
            log,
        })
    }

    fn record_discovery(
        &self,
        report: &DiscoveryReport,
        updates: &mut Vec<StationUpdate>,
        stats: &mut RunStats,
        log: &mut RunLog,
    ) {
        for outcome in &report.outcomes {
            let station = &outcome.station;
            for stage in &outcome.stages_tried {
                log.log(EventKind::DiscoveryStage {
                    name: station.name.clone(),
                    stage: stage.stage.to_string(),
                    found: stage.found,
                    error: stage.error.clone(),
                });
            }
            let Some(found) = &outcome.found else {
                log.log(EventKind::DiscoveryExhausted {
                    line: station.line,
                    name: station.name.clone(),
                    last_error: outcome.last_error.clone(),
                });
                continue;
            };

            stats.record_found(found.origin);
            let update = StationUpdate {
                line: station.line,
                name: adjust_name_for_url(&station.name, &found.url),
                old_url: station.url.clone(),
                new_url: found.url.clone(),
            };
            // A discovered URL supersedes a rename-only update for the same cell.
            updates.retain(|u| !(u.line == update.line && u.old_url == update.old_url));
            log.log(EventKind::StreamFound {
                line: station.line,
                name: update.name.clone(),
                old_url: update.old_url.clone(),
                new_url: update.new_url.clone(),
                origin: found.origin.to_string(),
            });
            updates.push(update);
        }
    }
}

/// Download the catalog, bypassing intermediate caches.
pub async fn fetch_catalog(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(CATALOG_FETCH_TIMEOUT)
        .build()
        .context("Failed to build catalog HTTP client")?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let resp = client
        .get(url)
        .query(&[("nocache", stamp.to_string())])
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .send()
        .await
        .with_context(|| format!("Failed to download catalog from {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "Catalog download rejected");
        anyhow::bail!("Catalog download returned HTTP {}", status.as_u16());
    }
    resp.text().await.context("Catalog body unreadable")
}
