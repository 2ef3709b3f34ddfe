// Browser-driven lookups used by the cascade stages, plus the pure helpers
// that build their queries and candidate URLs.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, info};
use url::{form_urlencoded, Url};

use super::actor::BrowserHandle;
use super::prioritizer::SearchHit;
use crate::infra::util::clean_station_name;

const DIRECTORY_TILE_SELECTOR: &str = "li.mdc-grid-tile a";
const DIRECTORY_TITLE_SELECTOR: &str = ".mdc-grid-tile__title";

const RESULT_SELECTOR: &str = ".result";
const RESULT_LINK_SELECTOR: &str = ".result__a";
const RESULT_SNIPPET_SELECTOR: &str = ".result__snippet";
const SEARCH_ENGINE_HOST: &str = "duckduckgo.com";

fn encode(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

// --- Directory ---

/// Search the station directory and return the station page to extract
/// from: the first tile whose title and the name contain one another,
/// else the first tile.
pub async fn find_directory_page(
    browser: &BrowserHandle,
    directory_url: &str,
    station_name: &str,
    wait: Duration,
    poll: Duration,
) -> Result<Option<String>> {
    let name = clean_station_name(station_name).to_lowercase();
    let search = format!(
        "{}/busca?q={}",
        directory_url.trim_end_matches('/'),
        encode(&name)
    );
    browser
        .navigate(&search)
        .await
        .context("Directory search failed to load")?;

    let deadline = Instant::now() + wait;
    let tiles = loop {
        let tiles = browser.find_elements(DIRECTORY_TILE_SELECTOR).await?;
        if !tiles.is_empty() || Instant::now() >= deadline {
            break tiles;
        }
        tokio::time::sleep(poll.max(Duration::from_millis(1))).await;
    };
    if tiles.is_empty() {
        debug!(name = name.as_str(), "Directory has no results");
        return Ok(None);
    }

    let mut first = None;
    for tile in &tiles {
        let Some(href) = browser.attribute(tile, "href").await? else {
            continue;
        };
        if first.is_none() {
            first = Some(href.clone());
        }
        let title = match browser
            .find_child_elements(tile, DIRECTORY_TITLE_SELECTOR)
            .await?
            .first()
        {
            Some(el) => browser.text(el).await?.trim().to_lowercase(),
            None => continue,
        };
        if !title.is_empty() && (title.contains(&name) || name.contains(&title)) {
            info!(title = title.as_str(), url = href.as_str(), "Directory title match");
            return Ok(Some(href));
        }
    }
    Ok(first)
}

// --- Web search ---

/// `radio <name> <suffix>`, without doubling a leading "radio".
pub fn search_query(station_name: &str, suffix: &str) -> String {
    let name = clean_station_name(station_name);
    let base = if name.to_lowercase().contains("radio") {
        name
    } else {
        format!("radio {name}")
    };
    if suffix.trim().is_empty() {
        base
    } else {
        format!("{base} {}", suffix.trim())
    }
}

/// Target of a search-engine redirect link (`...?uddg=<target>`), or the
/// link itself.
pub fn unwrap_redirect(href: &str) -> String {
    if !href.contains("uddg=") {
        return href.to_string();
    }
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

/// Run `query` through the HTML search page and collect organic results.
pub async fn web_search(
    browser: &BrowserHandle,
    search_url: &str,
    region: &str,
    query: &str,
    settle: Duration,
) -> Result<Vec<SearchHit>> {
    let url = format!("{search_url}?q={}&kl={}", encode(query), encode(region));
    browser
        .navigate(&url)
        .await
        .context("Web search failed to load")?;
    tokio::time::sleep(settle).await;

    let mut hits = Vec::new();
    for result in browser.find_elements(RESULT_SELECTOR).await? {
        let Some(link) = browser
            .find_child_elements(&result, RESULT_LINK_SELECTOR)
            .await?
            .into_iter()
            .next()
        else {
            continue;
        };
        let Some(href) = browser.attribute(&link, "href").await? else {
            continue;
        };
        let target = unwrap_redirect(&href);
        if !target.starts_with("http") {
            continue;
        }
        let snippet = match browser
            .find_child_elements(&result, RESULT_SNIPPET_SELECTOR)
            .await?
            .first()
        {
            Some(el) => browser.text(el).await.unwrap_or_default(),
            None => String::new(),
        };
        hits.push(SearchHit::new(target, snippet));
    }

    if hits.is_empty() {
        for link in browser.find_elements("a").await? {
            if let Some(href) = browser.attribute(&link, "href").await? {
                let target = unwrap_redirect(&href);
                if target.starts_with("http") && !target.contains(SEARCH_ENGINE_HOST) {
                    hits.push(SearchHit::new(target, ""));
                }
            }
        }
        debug!(links = hits.len(), "No structured results, using page links");
    }

    info!(query, results = hits.len(), "Web search complete");
    Ok(hits)
}

// --- Pattern guessing ---

/// Plausible station sites: the name with "radio" dropped, joined, hyphenated
/// and "radio"-prefixed, on each local TLD with and without `www.`.
pub fn candidate_site_urls(station_name: &str, local_tlds: &[String]) -> Vec<String> {
    let name = clean_station_name(station_name).to_lowercase();
    let core = name.replace("radio ", "").replace(" radio", "");
    let core = core.trim();
    if core.is_empty() {
        return Vec::new();
    }
    let joined = core.replace(' ', "");
    let versions = [joined.clone(), core.replace(' ', "-"), format!("radio{joined}")];

    let mut urls = Vec::new();
    for version in &versions {
        for tld in local_tlds {
            for prefix in ["https://www.", "https://"] {
                let url = format!("{prefix}{version}{tld}");
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_prefixes_radio_once() {
        assert_eq!(search_query("Mitre*", "live online"), "radio Mitre live online");
        assert_eq!(search_query("Radio Nacional", "live online"), "Radio Nacional live online");
        assert_eq!(search_query("Cadena 3", ""), "radio Cadena 3");
    }

    #[test]
    fn redirect_links_are_unwrapped() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.cadena3.com%2F&rut=abc";
        assert_eq!(unwrap_redirect(href), "https://www.cadena3.com/");
        assert_eq!(unwrap_redirect("https://plain.example/"), "https://plain.example/");
    }

    #[test]
    fn site_candidates_cover_variants() {
        let tlds = vec![".com.ar".to_string(), ".fm".to_string()];
        let urls = candidate_site_urls("Radio La Red", &tlds);
        assert_eq!(urls[0], "https://www.lared.com.ar");
        assert_eq!(urls[1], "https://lared.com.ar");
        assert!(urls.contains(&"https://la-red.fm".to_string()));
        assert!(urls.contains(&"https://www.radiolared.com.ar".to_string()));
        assert_eq!(urls.len(), 12);
    }

    #[test]
    fn single_word_names_do_not_repeat() {
        let tlds = vec![".ar".to_string()];
        let urls = candidate_site_urls("Continental", &tlds);
        // Joined and hyphenated forms are identical.
        assert_eq!(
            urls,
            vec![
                "https://www.continental.ar",
                "https://continental.ar",
                "https://www.radiocontinental.ar",
                "https://radiocontinental.ar",
            ]
        );
    }
}
