//! Rewrites vendor redirect and API URL shapes into direct stream URLs.
//!
//! Rules are an ordered table; the first whose matcher accepts the URL is
//! applied, and the result is normalized again up to [`MAX_DEPTH`] times.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use super::heuristics::LISTENING_API_PATH;
use crate::verification::StreamHttp;

pub const MAX_DEPTH: usize = 3;

const API_TIMEOUT: Duration = Duration::from_secs(5);

static NUMBERED_SERVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\d+\.live\.streamtheworld\.com/([^?#]+)").expect("valid regex")
});

const VENDOR_RESOLVER: &str = "https://playerservices.streamtheworld.com/api/livestream-redirect";

pub enum RuleAction {
    /// Pure string rewrite, no network.
    Rewrite(fn(&str) -> Option<String>),
    /// GET the URL as JSON and follow the string at `pointer`.
    FollowJson { pointer: &'static str },
}

pub struct NormalizeRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub action: RuleAction,
}

pub fn default_rules() -> Vec<NormalizeRule> {
    vec![
        NormalizeRule {
            name: "numbered_server",
            matches: |url| url.to_lowercase().contains("live.streamtheworld.com"),
            action: RuleAction::Rewrite(rewrite_numbered_server),
        },
        NormalizeRule {
            name: "listening_api",
            matches: |url| url.to_lowercase().contains(LISTENING_API_PATH),
            action: RuleAction::FollowJson {
                pointer: "/stream/data/url",
            },
        },
    ]
}

/// `N.live.streamtheworld.com/<mount>[?query]` → the vendor's resolver with
/// the same mount and query.
pub fn rewrite_numbered_server(url: &str) -> Option<String> {
    let caps = NUMBERED_SERVER_RE.captures(url)?;
    let mount = &caps[1];
    let query = url
        .split_once('?')
        .map(|(_, q)| format!("?{q}"))
        .unwrap_or_default();
    Some(format!("{VENDOR_RESOLVER}/{mount}{query}"))
}

pub struct UrlNormalizer {
    rules: Vec<NormalizeRule>,
    http: Arc<dyn StreamHttp>,
}

impl UrlNormalizer {
    pub fn new(http: Arc<dyn StreamHttp>) -> Self {
        Self::with_rules(http, default_rules())
    }

    pub fn with_rules(http: Arc<dyn StreamHttp>, rules: Vec<NormalizeRule>) -> Self {
        Self { rules, http }
    }

    /// Never fails: a rule that cannot be applied leaves the URL as it was.
    pub async fn normalize(&self, url: &str) -> String {
        let mut current = url.to_string();
        for _ in 0..MAX_DEPTH {
            let Some(rule) = self.rules.iter().find(|r| (r.matches)(&current)) else {
                break;
            };
            match self.apply(rule, &current).await {
                Some(next) if next != current => {
                    debug!(rule = rule.name, from = current.as_str(), to = next.as_str(), "URL normalized");
                    current = next;
                }
                _ => break,
            }
        }
        current
    }

    async fn apply(&self, rule: &NormalizeRule, url: &str) -> Option<String> {
        match &rule.action {
            RuleAction::Rewrite(rewrite) => rewrite(url),
            RuleAction::FollowJson { pointer } => {
                match self.http.get_json(url, API_TIMEOUT).await {
                    Ok(doc) => doc
                        .pointer(pointer)
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    Err(e) => {
                        warn!(rule = rule.name, url, error = %e, "Stream API lookup failed");
                        None
                    }
                }
            }
        }
    }
}
