use std::sync::Arc;
use std::time::Duration;

use radiocheck_common::{adjust_name_for_url, Station, VerificationOutcome};
use tracing::debug;

use super::cache::{host_key, HostCache};
use super::classifier::classify;
use super::prober::StreamHttp;

/// Result of verifying one station. `station.name` already carries the
/// provenance marker adjustment for its URL.
#[derive(Debug, Clone)]
pub struct Verification {
    pub station: Station,
    pub original_name: String,
    pub outcome: VerificationOutcome,
    pub cached: bool,
}

impl Verification {
    pub fn renamed(&self) -> bool {
        self.station.name != self.original_name
    }
}

/// Probes one station at a time against a shared host cache.
#[derive(Clone)]
pub struct Verifier {
    http: Arc<dyn StreamHttp>,
    cache: Arc<HostCache>,
    timeout: Duration,
}

impl Verifier {
    pub fn new(http: Arc<dyn StreamHttp>, cache: Arc<HostCache>, timeout: Duration) -> Self {
        Self {
            http,
            cache,
            timeout,
        }
    }

    pub async fn verify(&self, mut station: Station) -> Verification {
        let host = host_key(&station.url);
        let original_name = station.name.clone();

        let (outcome, cached) = match self.cache.get(&host) {
            Some(hit) => {
                debug!(url = station.url.as_str(), host = host.as_str(), "Host cache hit");
                (hit.as_cached(), true)
            }
            None => {
                let observation = self.http.probe(&station.url, self.timeout).await;
                let outcome = classify(&observation);
                self.cache.insert(host, outcome.clone());
                (outcome, false)
            }
        };

        station.name = adjust_name_for_url(&station.name, &station.url);

        Verification {
            station,
            original_name,
            outcome,
            cached,
        }
    }
}
