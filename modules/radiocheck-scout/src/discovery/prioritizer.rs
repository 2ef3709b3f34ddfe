use std::collections::HashSet;

use radiocheck_common::{DiscoveryCandidate, RelevanceTier};
use tracing::info;

use crate::infra::util::clean_station_name;

/// One organic web-search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    /// Lowercased result snippet, empty when none was shown.
    pub snippet: String,
}

impl SearchHit {
    pub fn new(url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            snippet: snippet.into().to_lowercase(),
        }
    }
}

const RADIO_KEYWORDS: &[&str] = &[
    "radio",
    "emisora",
    "escuchar",
    "online",
    "vivo",
    "live",
    "listen",
    "dial",
    "fm",
    "am",
    "estación",
    "station",
    "streaming",
    "broadcasting",
];

const IGNORED_DOMAINS: &[&str] = &[
    "duckduckgo.com",
    "google.com",
    "youtube.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "wikipedia.org",
    "wikimedia",
    "linkedin.com",
    "tiktok.com",
    "reddit.com",
];

const AGGREGATOR_DOMAINS: &[&str] = &[
    "tunein.com",
    "radio.net",
    "onlineradiobox.com",
    "radiostationusa.fm",
    "raddio.net",
    "radioarg.net",
    "streema.com",
    "mytuner-radio.com",
    "radio.garden",
    "radios.com.ar",
    "vtuner.com",
    "live-radio.net",
    "radiomap.eu",
    "fmstream.org",
    "streamitter.com",
    "estacionesderadio.com.ar",
];

/// Suffixes stripped to get a domain's core name, longest first.
const CORE_SUFFIXES: &[&str] = &[".com.ar", ".com", ".ar", ".net", ".fm", ".org", ".live", ".tv"];

/// Ranks search results for a station.
pub struct Prioritizer {
    local_tlds: Vec<String>,
}

impl Prioritizer {
    pub fn new(local_tlds: Vec<String>) -> Self {
        Self { local_tlds }
    }

    /// Order results top → official → other → aggregator and keep `max`.
    /// A result whose domain core is exactly the station name is returned
    /// alone.
    pub fn prioritize(&self, station_name: &str, hits: &[SearchHit], max: usize) -> Vec<DiscoveryCandidate> {
        let name = clean_station_name(station_name).to_lowercase();
        let key_word = name_key_word(&name);
        let name_without_radio: String = name
            .replace("radio", "")
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let name_compact: String = name
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();

        let mut seen_domains = HashSet::new();
        let mut ranked: Vec<DiscoveryCandidate> = Vec::new();

        for hit in hits {
            let url_lower = hit.url.to_lowercase();
            let domain = domain_of(&url_lower);
            if !seen_domains.insert(domain.clone()) {
                continue;
            }
            if IGNORED_DOMAINS.iter().any(|d| url_lower.contains(d)) {
                continue;
            }

            let core = domain_core(&domain);
            if !core.is_empty() && (core == name_without_radio || core == name_compact) {
                info!(url = hit.url.as_str(), "Domain matches station name exactly");
                return vec![DiscoveryCandidate::ranked(hit.url.clone(), RelevanceTier::Exact)];
            }

            if AGGREGATOR_DOMAINS.iter().any(|d| url_lower.contains(d)) {
                ranked.push(DiscoveryCandidate::ranked(hit.url.clone(), RelevanceTier::Aggregator));
                continue;
            }

            let official = self.is_official_domain(&domain);
            let has_name = !key_word.is_empty() && url_lower.contains(key_word);
            let radio_snippet = RADIO_KEYWORDS.iter().any(|kw| hit.snippet.contains(kw));

            let tier = if official && has_name {
                if radio_snippet {
                    RelevanceTier::Top
                } else {
                    RelevanceTier::Official
                }
            } else if has_name || radio_snippet {
                RelevanceTier::Other
            } else {
                continue;
            };
            ranked.push(DiscoveryCandidate::ranked(hit.url.clone(), tier));
        }

        // Stable: keeps search order within a tier.
        ranked.sort_by_key(|c| c.tier);
        ranked.truncate(max);

        info!(
            top = count(&ranked, RelevanceTier::Top),
            official = count(&ranked, RelevanceTier::Official),
            aggregators = count(&ranked, RelevanceTier::Aggregator),
            "Search results prioritized"
        );
        ranked
    }

    fn is_official_domain(&self, domain: &str) -> bool {
        domain.ends_with(".com") || self.local_tlds.iter().any(|tld| domain.ends_with(tld.as_str()))
    }
}

fn count(ranked: &[DiscoveryCandidate], tier: RelevanceTier) -> usize {
    ranked.iter().filter(|c| c.tier == Some(tier)).count()
}

/// First word of the name that is not "radio"; most station names start
/// with it and it would match every result.
fn name_key_word(name: &str) -> &str {
    name.split_whitespace()
        .find(|w| *w != "radio")
        .or_else(|| name.split_whitespace().next())
        .unwrap_or("")
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

fn domain_core(domain: &str) -> String {
    let bare = domain.strip_prefix("www.").unwrap_or(domain);
    for suffix in CORE_SUFFIXES {
        if let Some(core) = bare.strip_suffix(suffix) {
            return core.trim_end_matches('.').to_string();
        }
    }
    bare.split('.').next().unwrap_or(bare).to_string()
}
