pub mod cache;
pub mod classifier;
pub mod prober;
pub mod verifier;

pub use cache::{host_key, HostCache};
pub use classifier::{classify, classify_strict, ProbeObservation};
pub use prober::{HttpProber, StreamHttp};
pub use verifier::{Verification, Verifier};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{future, stream, StreamExt};
use radiocheck_common::{OutcomeKind, Station};
use tracing::info;

use crate::pipeline::progress::ProgressSink;

/// Everything the verification phase produced, in completion order.
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub results: Vec<Verification>,
    pub cancelled: bool,
}

impl VerificationReport {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.results
            .iter()
            .filter(|v| v.outcome.kind() == kind)
            .count()
    }

    /// Dead and timed-out stations, with their adjusted names.
    pub fn needing_discovery(&self) -> Vec<Station> {
        self.results
            .iter()
            .filter(|v| v.outcome.needs_discovery())
            .map(|v| v.station.clone())
            .collect()
    }
}

/// Verify every station with at most `concurrency` probes in flight.
///
/// The cancel flag is read before each new probe is started. Probes already
/// running finish and are included in the report.
pub async fn verify_all(
    verifier: &Verifier,
    stations: Vec<Station>,
    concurrency: usize,
    cancelled: &Arc<AtomicBool>,
    progress: &dyn ProgressSink,
) -> VerificationReport {
    let total = stations.len();
    info!(total, concurrency, "Verifying streams");

    let flag = cancelled.clone();
    let mut in_flight = stream::iter(stations)
        .take_while(move |_| future::ready(!flag.load(Ordering::Relaxed)))
        .map(|station| {
            let verifier = verifier.clone();
            async move { verifier.verify(station).await }
        })
        .buffer_unordered(concurrency.max(1));

    let mut report = VerificationReport::default();
    while let Some(verification) = in_flight.next().await {
        progress.verification_progress(report.results.len() + 1, total, &verification);
        report.results.push(verification);
    }

    report.cancelled = report.results.len() < total && cancelled.load(Ordering::Relaxed);
    if report.cancelled {
        info!(done = report.results.len(), total, "Verification cancelled");
    }
    report
}
