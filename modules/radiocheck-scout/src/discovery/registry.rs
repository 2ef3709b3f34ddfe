use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);
const REGISTRY_LIMIT: u32 = 10;

/// One station record from a public station-metadata registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryStation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub url_resolved: String,
}

impl RegistryStation {
    /// The resolved URL when the registry has one, else the submitted URL.
    pub fn stream_url(&self) -> Option<&str> {
        [self.url_resolved.as_str(), self.url.as_str()]
            .into_iter()
            .find(|u| !u.trim().is_empty())
    }
}

#[async_trait]
pub trait StationRegistry: Send + Sync {
    /// Stations matching `name`, most popular first.
    async fn search(&self, name: &str) -> Result<Vec<RegistryStation>>;
}

/// Radio Browser (`/json/stations/search`) client.
pub struct RadioBrowserClient {
    client: reqwest::Client,
    base_url: String,
    country_code: String,
}

impl RadioBrowserClient {
    pub fn new(base_url: &str, country_code: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REGISTRY_TIMEOUT)
            .user_agent(crate::verification::prober::PROBE_USER_AGENT)
            .build()
            .context("Failed to build registry HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            country_code: country_code.to_string(),
        })
    }
}

#[async_trait]
impl StationRegistry for RadioBrowserClient {
    async fn search(&self, name: &str) -> Result<Vec<RegistryStation>> {
        let url = format!("{}/json/stations/search", self.base_url);
        let limit = REGISTRY_LIMIT.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("name", name),
                ("hidebroken", "true"),
                ("limit", limit.as_str()),
                ("order", "votes"),
                ("reverse", "true"),
                ("countrycode", self.country_code.as_str()),
            ])
            .send()
            .await
            .context("Registry request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Registry returned HTTP {}", status.as_u16());
        }
        let stations: Vec<RegistryStation> = resp
            .json()
            .await
            .context("Registry response is not a station list")?;
        debug!(name, results = stations.len(), "Registry search complete");
        Ok(stations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_url_is_preferred() {
        let station = RegistryStation {
            name: "X".into(),
            url: "http://a.example/pls".into(),
            url_resolved: "http://b.example/live.mp3".into(),
        };
        assert_eq!(station.stream_url(), Some("http://b.example/live.mp3"));
    }

    #[test]
    fn empty_resolved_falls_back() {
        let station: RegistryStation =
            serde_json::from_str(r#"{"name":"X","url":"http://a.example/live","url_resolved":""}"#)
                .unwrap();
        assert_eq!(station.stream_url(), Some("http://a.example/live"));
        assert_eq!(RegistryStation::default().stream_url(), None);
    }
}
