use tracing::info;

use crate::discovery::DiscoveryOutcome;
use crate::verification::Verification;

/// Receives per-unit progress from both worker pools. A presentation layer
/// (progress bar, table view) implements this; the default just logs.
pub trait ProgressSink: Send + Sync {
    fn verification_progress(&self, done: usize, total: usize, result: &Verification);
    fn discovery_progress(&self, done: usize, total: usize, outcome: &DiscoveryOutcome);
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn verification_progress(&self, done: usize, total: usize, result: &Verification) {
        info!(
            done,
            total,
            station = result.station.name.as_str(),
            url = result.station.url.as_str(),
            outcome = %result.outcome,
            "Verified"
        );
    }

    fn discovery_progress(&self, done: usize, total: usize, outcome: &DiscoveryOutcome) {
        match &outcome.found {
            Some(found) => info!(
                done,
                total,
                station = outcome.station.name.as_str(),
                url = found.url.as_str(),
                origin = %found.origin,
                "Replacement stream found"
            ),
            None => info!(
                done,
                total,
                station = outcome.station.name.as_str(),
                stages = outcome.stages_tried.len(),
                "No replacement stream found"
            ),
        }
    }
}

/// Discards all progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn verification_progress(&self, _: usize, _: usize, _: &Verification) {}
    fn discovery_progress(&self, _: usize, _: usize, _: &DiscoveryOutcome) {}
}
