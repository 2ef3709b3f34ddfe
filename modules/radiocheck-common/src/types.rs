use serde::{Deserialize, Serialize};

// --- Station ---

/// One catalog entry. `line` is the index of the row in the origin document,
/// used to rewrite that row once a replacement stream is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub frequency: String,
    pub url: String,
    pub line: usize,
}

impl Station {
    pub fn new(name: &str, frequency: &str, url: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            frequency: frequency.to_string(),
            url: url.to_string(),
            line,
        }
    }
}

// --- Verification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Alive,
    Dead,
    Timeout,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Alive => write!(f, "ALIVE"),
            OutcomeKind::Dead => write!(f, "DEAD"),
            OutcomeKind::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Result of probing one stream URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Alive(String),
    Dead(String),
    Timeout(String),
}

impl VerificationOutcome {
    pub fn alive(detail: impl Into<String>) -> Self {
        Self::Alive(detail.into())
    }

    pub fn dead(detail: impl Into<String>) -> Self {
        Self::Dead(detail.into())
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Timeout(detail.into())
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Alive(_) => OutcomeKind::Alive,
            Self::Dead(_) => OutcomeKind::Dead,
            Self::Timeout(_) => OutcomeKind::Timeout,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Alive(d) | Self::Dead(d) | Self::Timeout(d) => d,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Alive(_))
    }

    /// Dead and timed-out stations are handed to discovery.
    pub fn needs_discovery(&self) -> bool {
        !self.is_alive()
    }

    /// Same outcome kind with a `(cache)` prefix on the detail.
    pub fn as_cached(&self) -> Self {
        let detail = format!("(cache) {}", self.detail());
        match self.kind() {
            OutcomeKind::Alive => Self::Alive(detail),
            OutcomeKind::Dead => Self::Dead(detail),
            OutcomeKind::Timeout => Self::Timeout(detail),
        }
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.kind(), self.detail())
    }
}

// --- Discovery ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    RegistryApi,
    Directory,
    WebSearch,
    PatternGuess,
}

impl std::fmt::Display for CandidateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateOrigin::RegistryApi => write!(f, "registry_api"),
            CandidateOrigin::Directory => write!(f, "directory"),
            CandidateOrigin::WebSearch => write!(f, "web_search"),
            CandidateOrigin::PatternGuess => write!(f, "pattern_guess"),
        }
    }
}

/// Priority tier assigned to web-search results, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceTier {
    /// Domain core equals the station name.
    Exact,
    Top,
    Official,
    Other,
    Aggregator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryCandidate {
    pub url: String,
    pub origin: CandidateOrigin,
    pub tier: Option<RelevanceTier>,
}

impl DiscoveryCandidate {
    pub fn ranked(url: impl Into<String>, tier: RelevanceTier) -> Self {
        Self {
            url: url.into(),
            origin: CandidateOrigin::WebSearch,
            tier: Some(tier),
        }
    }
}

/// A stream URL that passed strict validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundStream {
    pub url: String,
    pub origin: CandidateOrigin,
}

// --- Catalog rewrite ---

/// Replacement for one catalog row. `old_url == new_url` when only the name
/// changed (provenance marker gained or lost).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationUpdate {
    pub line: usize,
    pub name: String,
    pub old_url: String,
    pub new_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_outcome_keeps_kind() {
        let outcome = VerificationOutcome::dead("404");
        let cached = outcome.as_cached();
        assert_eq!(cached.kind(), OutcomeKind::Dead);
        assert_eq!(cached.detail(), "(cache) 404");
    }

    #[test]
    fn timeout_needs_discovery() {
        assert!(VerificationOutcome::timeout("read timeout").needs_discovery());
        assert!(VerificationOutcome::dead("404").needs_discovery());
        assert!(!VerificationOutcome::alive("200").needs_discovery());
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_value(VerificationOutcome::alive("200")).unwrap();
        assert_eq!(json["kind"], "alive");
        assert_eq!(json["detail"], "200");
    }

    #[test]
    fn tiers_order_best_first() {
        assert!(RelevanceTier::Exact < RelevanceTier::Top);
        assert!(RelevanceTier::Other < RelevanceTier::Aggregator);
    }
}
