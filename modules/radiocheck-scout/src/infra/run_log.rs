//! Run log: a timeline of what one run did, written as JSON next to the
//! rewritten catalog.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::stats::RunStats;

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u32,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CatalogLoaded {
        source: String,
        stations: usize,
    },
    StationVerified {
        line: usize,
        name: String,
        url: String,
        outcome: String,
        detail: String,
        cached: bool,
    },
    DiscoveryStage {
        name: String,
        stage: String,
        found: bool,
        error: Option<String>,
    },
    StreamFound {
        line: usize,
        name: String,
        old_url: String,
        new_url: String,
        origin: String,
    },
    DiscoveryExhausted {
        line: usize,
        name: String,
        last_error: Option<String>,
    },
    CatalogWritten {
        path: String,
        updates: usize,
    },
    Cancelled {
        phase: String,
    },
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    pub fn to_json(&self, stats: &RunStats) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "run_id": self.run_id,
            "started_at": self.started_at,
            "finished_at": Utc::now(),
            "stats": SerializedStats::from(stats),
            "events": self.events,
        }))
    }

    /// Serialize the run log and write it to `path`.
    pub async fn save_to_file(&self, path: &Path, stats: &RunStats) -> Result<()> {
        let body = serde_json::to_string_pretty(&self.to_json(stats)?)?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write run log to {}", path.display()))?;
        info!(run_id = %self.run_id, events = self.events.len(), path = %path.display(), "Run log saved");
        Ok(())
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Serialization wrappers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SerializedStats {
    stations: u32,
    alive: u32,
    dead: u32,
    timeout: u32,
    cache_hits: u32,
    renamed: u32,
    discovery_attempted: u32,
    discovery_found: u32,
    found_by_registry: u32,
    found_by_directory: u32,
    found_by_web_search: u32,
    found_by_pattern_guess: u32,
    updates_written: u32,
    elapsed_ms: u64,
    cancelled: bool,
}

impl From<&RunStats> for SerializedStats {
    fn from(s: &RunStats) -> Self {
        Self {
            stations: s.stations,
            alive: s.alive,
            dead: s.dead,
            timeout: s.timeout,
            cache_hits: s.cache_hits,
            renamed: s.renamed,
            discovery_attempted: s.discovery_attempted,
            discovery_found: s.discovery_found,
            found_by_registry: s.by_origin[0],
            found_by_directory: s.by_origin[1],
            found_by_web_search: s.by_origin[2],
            found_by_pattern_guess: s.by_origin[3],
            updates_written: s.updates_written,
            elapsed_ms: s.elapsed.as_millis() as u64,
            cancelled: s.cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_sequenced_and_tagged() {
        let mut log = RunLog::new();
        log.log(EventKind::CatalogLoaded {
            source: "radios.md".into(),
            stations: 3,
        });
        log.log(EventKind::Cancelled {
            phase: "verification".into(),
        });

        let json = log.to_json(&RunStats::default()).unwrap();
        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["seq"], 0);
        assert_eq!(events[0]["type"], "catalog_loaded");
        assert_eq!(events[0]["stations"], 3);
        assert_eq!(events[1]["seq"], 1);
        assert_eq!(events[1]["type"], "cancelled");
        assert_eq!(json["stats"]["stations"], 0);
    }
}
