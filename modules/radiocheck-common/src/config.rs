use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::{RadioCheckError, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Catalog
    pub catalog_url: Option<String>,
    pub catalog_header_label: Option<String>,
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,

    // Verification
    pub probe_timeout: Duration,
    /// DNS + TCP + TLS bound for every probe, separate from `probe_timeout`.
    pub connect_timeout: Duration,
    pub validation_timeout: Duration,
    pub site_check_timeout: Duration,
    pub verify_concurrency: usize,

    // Discovery
    pub auto_discover: bool,
    pub discovery_concurrency: usize,
    pub registry_api_url: String,
    pub country_code: String,
    pub directory_url: String,
    pub directory_embed_url: String,
    pub search_url: String,
    pub search_region: String,
    pub search_suffix: String,
    pub local_tlds: Vec<String>,

    // Browser
    pub webdriver_url: String,
    pub browser_headless: bool,
    pub timings: DiscoveryTimings,
}

/// Fixed waits used while driving pages. The discovery engine sleeps for
/// these, so tests swap in [`DiscoveryTimings::instant`].
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryTimings {
    pub page_settle: Duration,
    pub passive_wait: Duration,
    pub stabilization: Duration,
    pub interaction_settle: Duration,
    pub frame_settle: Duration,
    pub directory_results: Duration,
    pub search_settle: Duration,
    pub poll_interval: Duration,
    pub browser_warmup: Duration,
    pub max_interactions: usize,
}

impl Default for DiscoveryTimings {
    fn default() -> Self {
        Self {
            page_settle: Duration::from_secs(10),
            passive_wait: Duration::from_secs(12),
            stabilization: Duration::from_secs(3),
            interaction_settle: Duration::from_secs(10),
            frame_settle: Duration::from_secs(10),
            directory_results: Duration::from_secs(8),
            search_settle: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            browser_warmup: Duration::from_secs(5),
            max_interactions: 8,
        }
    }
}

impl DiscoveryTimings {
    /// Near-zero waits for tests.
    pub fn instant() -> Self {
        Self {
            page_settle: Duration::ZERO,
            passive_wait: Duration::from_millis(20),
            stabilization: Duration::ZERO,
            interaction_settle: Duration::ZERO,
            frame_settle: Duration::ZERO,
            directory_results: Duration::from_millis(20),
            search_settle: Duration::ZERO,
            poll_interval: Duration::from_millis(5),
            browser_warmup: Duration::ZERO,
            max_interactions: 8,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: None,
            catalog_header_label: None,
            output_path: PathBuf::from("radios.md"),
            report_path: None,
            probe_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            validation_timeout: Duration::from_secs(7),
            site_check_timeout: Duration::from_secs(3),
            verify_concurrency: 30,
            auto_discover: true,
            discovery_concurrency: 2,
            registry_api_url: "https://de1.api.radio-browser.info".to_string(),
            country_code: "AR".to_string(),
            directory_url: "https://www.radios-argentinas.org".to_string(),
            directory_embed_url: "http://e.radios-argentinas.org/embed".to_string(),
            search_url: "https://html.duckduckgo.com/html/".to_string(),
            search_region: "ar-es".to_string(),
            search_suffix: "live online".to_string(),
            local_tlds: vec![".com.ar".to_string(), ".ar".to_string(), ".fm".to_string()],
            webdriver_url: "http://localhost:9515".to_string(),
            browser_headless: true,
            timings: DiscoveryTimings::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Every variable is
    /// optional; malformed values are errors rather than silent defaults.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Self {
            catalog_url: optional_env("CATALOG_URL"),
            catalog_header_label: optional_env("CATALOG_HEADER_LABEL"),
            output_path: optional_env("OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.output_path),
            report_path: optional_env("REPORT_PATH").map(PathBuf::from),
            probe_timeout: secs_env("PROBE_TIMEOUT_SECS", d.probe_timeout)?,
            connect_timeout: secs_env("CONNECT_TIMEOUT_SECS", d.connect_timeout)?,
            validation_timeout: secs_env("VALIDATION_TIMEOUT_SECS", d.validation_timeout)?,
            site_check_timeout: secs_env("SITE_CHECK_TIMEOUT_SECS", d.site_check_timeout)?,
            verify_concurrency: parsed_env("VERIFY_CONCURRENCY", d.verify_concurrency)?,
            auto_discover: bool_env("AUTO_DISCOVER", d.auto_discover)?,
            discovery_concurrency: parsed_env("DISCOVERY_CONCURRENCY", d.discovery_concurrency)?,
            registry_api_url: optional_env("REGISTRY_API_URL").unwrap_or(d.registry_api_url),
            country_code: optional_env("COUNTRY_CODE").unwrap_or(d.country_code),
            directory_url: optional_env("DIRECTORY_URL").unwrap_or(d.directory_url),
            directory_embed_url: optional_env("DIRECTORY_EMBED_URL")
                .unwrap_or(d.directory_embed_url),
            search_url: optional_env("SEARCH_URL").unwrap_or(d.search_url),
            search_region: optional_env("SEARCH_REGION").unwrap_or(d.search_region),
            search_suffix: optional_env("SEARCH_SUFFIX").unwrap_or(d.search_suffix),
            local_tlds: optional_env("LOCAL_TLDS")
                .map(|v| split_list(&v))
                .unwrap_or(d.local_tlds),
            webdriver_url: optional_env("WEBDRIVER_URL").unwrap_or(d.webdriver_url),
            browser_headless: bool_env("BROWSER_HEADLESS", d.browser_headless)?,
            timings: d.timings,
        }
        .validated()
    }

    fn validated(self) -> Result<Self> {
        if self.verify_concurrency == 0 {
            return Err(RadioCheckError::Config(
                "VERIFY_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.discovery_concurrency == 0 {
            return Err(RadioCheckError::Config(
                "DISCOVERY_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(RadioCheckError::Config(
                "CONNECT_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if self.local_tlds.is_empty() {
            return Err(RadioCheckError::Config("LOCAL_TLDS must not be empty".to_string()));
        }
        Ok(self)
    }

    /// Header labels used to recognise the catalog header row.
    pub fn header_labels(&self) -> Vec<&str> {
        match &self.catalog_header_label {
            Some(label) => vec![label.as_str()],
            None => crate::catalog::DEFAULT_HEADER_LABELS.to_vec(),
        }
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        info!(
            catalog_url = self.catalog_url.as_deref().unwrap_or("-"),
            output = %self.output_path.display(),
            verify_concurrency = self.verify_concurrency,
            discovery_concurrency = self.discovery_concurrency,
            probe_timeout_secs = self.probe_timeout.as_secs(),
            connect_timeout_secs = self.connect_timeout.as_secs(),
            auto_discover = self.auto_discover,
            country = self.country_code.as_str(),
            webdriver = self.webdriver_url.as_str(),
            headless = self.browser_headless,
            "Configuration loaded"
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RadioCheckError::Config(format!("{key} must be a number, got '{raw}'"))),
        None => Ok(default),
    }
}

fn secs_env(key: &str, default: Duration) -> Result<Duration> {
    parsed_env(key, default.as_secs()).map(Duration::from_secs)
}

fn bool_env(key: &str, default: bool) -> Result<bool> {
    match optional_env(key) {
        Some(raw) => parse_bool(&raw)
            .ok_or_else(|| RadioCheckError::Config(format!("{key} must be true/false, got '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
