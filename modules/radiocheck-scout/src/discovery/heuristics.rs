//! Cheap "is this URL plausibly an audio stream" test used on anything a page
//! or the registry hands us, before spending a real probe on it.

use url::Url;

const STATIC_ASSET_ENDINGS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".eot", ".json", ".xml", ".html", ".webp", ".map", ".txt",
];

const NON_AUDIO_FRAGMENTS: &[&str] = &[
    "duckduckgo.com",
    "google.com",
    "facebook.com",
    "/js/",
    "/css/",
    "/images/",
    "/img/",
    "/fonts/",
    "/assets/",
    "/_astro/",
    "/static/",
    "analytics",
    "tracking",
    "pixel",
    "advertisement",
];

const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".aac", ".aacp", ".m3u8", ".pls", ".m3u", ".ogg", ".oga"];

const STREAM_KEYWORDS: &[&str] = &[
    "icecast",
    "shoutcast",
    "streamtheworld",
    "/stream",
    "/live",
    "/radio",
    "/audio",
    "listen",
    "player",
    "broadcast",
    "api/listening",
];

const ASSET_DIRS: &[&str] = &["/js/", "/css/", "/fonts/", "/images/"];

const STREAMING_PORTS: &[u16] = &[8000, 8080, 8443, 9000, 7189];

pub const LISTENING_API_PATH: &str = "emisoraenvivo.com/api/listening/";

pub fn looks_like_audio(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    let lower = url.to_lowercase();

    if STATIC_ASSET_ENDINGS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    if NON_AUDIO_FRAGMENTS.iter().any(|frag| lower.contains(frag)) {
        return false;
    }

    let parsed = Url::parse(url).ok();
    let path = parsed
        .as_ref()
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if AUDIO_EXTENSIONS.iter().any(|ext| path.contains(ext)) {
        return true;
    }

    let has_keyword = STREAM_KEYWORDS
        .iter()
        .any(|kw| path.contains(kw) || host.contains(kw));
    if has_keyword && !ASSET_DIRS.iter().any(|dir| path.contains(dir)) {
        return true;
    }

    if lower.contains(LISTENING_API_PATH) {
        return true;
    }

    parsed
        .and_then(|u| u.port())
        .is_some_and(|port| STREAMING_PORTS.contains(&port))
        && !STATIC_ASSET_ENDINGS.iter().any(|ext| path.contains(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_extension_is_audio() {
        assert!(looks_like_audio("https://cdn.example.com/live.m3u8"));
    }

    #[test]
    fn script_is_not_audio() {
        assert!(!looks_like_audio("https://site.com/app.js"));
    }

    #[test]
    fn streaming_port_is_audio() {
        assert!(looks_like_audio("https://site.com:8000/"));
    }

    #[test]
    fn asset_image_is_not_audio() {
        assert!(!looks_like_audio("https://site.com/assets/img/logo.png"));
    }

    #[test]
    fn keyword_in_host_or_path() {
        assert!(looks_like_audio("https://icecast.example.net/mount"));
        assert!(looks_like_audio("https://example.net/stream"));
        assert!(!looks_like_audio("https://example.net/about"));
    }

    #[test]
    fn keyword_inside_asset_dir_is_rejected() {
        assert!(!looks_like_audio("https://example.net/fonts/player-icons"));
    }

    #[test]
    fn tracking_and_search_urls_are_rejected() {
        assert!(!looks_like_audio("https://stats.example.net/analytics/live"));
        assert!(!looks_like_audio("https://www.google.com/radio"));
    }

    #[test]
    fn listening_api_is_audio() {
        assert!(looks_like_audio("https://emisoraenvivo.com/api/listening/123"));
    }
}
