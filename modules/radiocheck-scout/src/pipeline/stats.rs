use std::time::Duration;

use radiocheck_common::CandidateOrigin;

/// Stats from one verification + discovery run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub stations: u32,
    pub alive: u32,
    pub dead: u32,
    pub timeout: u32,
    pub cache_hits: u32,
    pub renamed: u32,
    pub discovery_attempted: u32,
    pub discovery_found: u32,
    pub by_origin: [u32; 4], // Registry, Directory, WebSearch, PatternGuess
    pub updates_written: u32,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunStats {
    pub fn record_found(&mut self, origin: CandidateOrigin) {
        self.discovery_found += 1;
        let slot = match origin {
            CandidateOrigin::RegistryApi => 0,
            CandidateOrigin::Directory => 1,
            CandidateOrigin::WebSearch => 2,
            CandidateOrigin::PatternGuess => 3,
        };
        self.by_origin[slot] += 1;
    }
}

fn pct(part: u32, total: u32) -> f64 {
    part as f64 / total.max(1) as f64 * 100.0
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Stream Check Complete ===")?;
        writeln!(f, "Stations:      {}", self.stations)?;
        writeln!(f, "  Alive:       {} ({:.0}%)", self.alive, pct(self.alive, self.stations))?;
        writeln!(f, "  Dead:        {} ({:.0}%)", self.dead, pct(self.dead, self.stations))?;
        writeln!(f, "  Timeout:     {} ({:.0}%)", self.timeout, pct(self.timeout, self.stations))?;
        writeln!(f, "Cache hits:    {}", self.cache_hits)?;
        writeln!(f, "Renamed:       {}", self.renamed)?;
        if self.discovery_attempted > 0 {
            writeln!(f, "\nDiscovery:")?;
            writeln!(
                f,
                "  Found:       {} of {} ({:.0}%)",
                self.discovery_found,
                self.discovery_attempted,
                pct(self.discovery_found, self.discovery_attempted)
            )?;
            writeln!(f, "  Registry:    {}", self.by_origin[0])?;
            writeln!(f, "  Directory:   {}", self.by_origin[1])?;
            writeln!(f, "  Web search:  {}", self.by_origin[2])?;
            writeln!(f, "  Guessed:     {}", self.by_origin[3])?;
        }
        writeln!(f, "\nRows updated:  {}", self.updates_written)?;
        writeln!(f, "Elapsed:       {:.1}s", self.elapsed.as_secs_f64())?;
        if self.cancelled {
            writeln!(f, "(run was cancelled)")?;
        }
        Ok(())
    }
}
