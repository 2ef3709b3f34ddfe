pub mod actor;
pub mod browser;
pub mod extractor;
pub mod finder;
pub mod heuristics;
pub mod monitor;
pub mod normalizer;
pub mod prioritizer;
pub mod registry;
pub mod stages;
pub mod webdriver;

pub use actor::{BrowserActor, BrowserHandle};
pub use browser::{BrowserDriver, BrowserLauncher, ConsoleEntry, ElementHandle, NetworkEvent};
pub use finder::{DiscoveryOutcome, Stage, StageReport, StreamFinder};
pub use heuristics::looks_like_audio;
pub use monitor::{DiscoverySession, PassiveSignals};
pub use normalizer::UrlNormalizer;
pub use prioritizer::{Prioritizer, SearchHit};
pub use registry::{RadioBrowserClient, RegistryStation, StationRegistry};
pub use webdriver::{WebDriverBrowser, WebDriverLauncher};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{future, stream, StreamExt};
use radiocheck_common::Station;
use tracing::{error, info};

use crate::pipeline::progress::ProgressSink;

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub outcomes: Vec<DiscoveryOutcome>,
    pub cancelled: bool,
}

impl DiscoveryReport {
    pub fn found_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.found.is_some()).count()
    }
}

/// Run the cascade for each station with at most `concurrency` browser
/// sessions alive at once.
///
/// Each station runs in its own task so a panic in one cascade is reported
/// as that station's failure. The cancel flag stops new stations from
/// starting; running cascades finish.
pub async fn discover_all(
    finder: Arc<StreamFinder>,
    stations: Vec<Station>,
    concurrency: usize,
    cancelled: &Arc<AtomicBool>,
    progress: &dyn ProgressSink,
) -> DiscoveryReport {
    let total = stations.len();
    info!(total, concurrency, "Discovering replacement streams");

    let flag = cancelled.clone();
    let mut in_flight = stream::iter(stations)
        .take_while(move |_| future::ready(!flag.load(Ordering::Relaxed)))
        .map(|station| {
            let finder = finder.clone();
            async move {
                let fallback = station.clone();
                match tokio::spawn(async move { finder.discover(station).await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(station = fallback.name.as_str(), error = %e, "Discovery task failed");
                        DiscoveryOutcome::failed(fallback, e.to_string())
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut report = DiscoveryReport::default();
    while let Some(outcome) = in_flight.next().await {
        progress.discovery_progress(report.outcomes.len() + 1, total, &outcome);
        report.outcomes.push(outcome);
    }

    report.cancelled = report.outcomes.len() < total && cancelled.load(Ordering::Relaxed);
    info!(
        found = report.found_count(),
        done = report.outcomes.len(),
        total,
        cancelled = report.cancelled,
        "Discovery finished"
    );
    report
}
