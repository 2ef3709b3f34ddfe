use std::collections::HashMap;
use std::sync::Mutex;

use radiocheck_common::VerificationOutcome;

/// Last outcome per host for one run.
///
/// Lookups and stores each take the lock briefly; the probe itself runs
/// unlocked, so two first-time probes of the same host may both go out and
/// the later store wins.
#[derive(Default)]
pub struct HostCache {
    entries: Mutex<HashMap<String, VerificationOutcome>>,
}

impl HostCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, host: &str) -> Option<VerificationOutcome> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(host)
            .cloned()
    }

    pub fn insert(&self, host: String, outcome: VerificationOutcome) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(host, outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for a URL: `hostname[:port]`, scheme ignored. Unparseable URLs
/// key on themselves so they never share an entry.
pub fn host_key(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}
