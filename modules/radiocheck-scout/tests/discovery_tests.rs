use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use radiocheck_common::{CandidateOrigin, DiscoveryTimings, Station};
use radiocheck_scout::discovery::extractor::{ExtractorSettings, PageExtractor};
use radiocheck_scout::discovery::{
    discover_all, DiscoverySession, NetworkEvent, RadioBrowserClient, Stage, StationRegistry,
    StreamFinder, UrlNormalizer,
};
use radiocheck_scout::pipeline::NoProgress;
use radiocheck_scout::testing::{
    audio, registry_station, test_config, ClickEffect, MockBrowser, MockElement, MockHttp,
    MockLauncher, MockPage, MockRegistry,
};
use radiocheck_scout::verification::ProbeObservation;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dead_station(name: &str) -> Station {
    Station::new(name, "101.5", "http://dead.example/stream", 3)
}

fn extractor(http: Arc<MockHttp>) -> PageExtractor {
    PageExtractor::new(
        http,
        ExtractorSettings {
            directory_host: "www.radios-argentinas.org".to_string(),
            directory_embed_url: "http://e.radios-argentinas.org/embed".to_string(),
            validation_timeout: Duration::from_secs(1),
            timings: DiscoveryTimings::instant(),
        },
    )
}

async fn open_session(browser: &MockBrowser) -> DiscoverySession {
    let launcher = MockLauncher::new(browser.clone());
    DiscoverySession::open(&launcher, Duration::from_millis(5), Duration::ZERO)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registry_hit_never_starts_a_browser() {
    let http = Arc::new(MockHttp::new().on_probe("http://new.example/live.mp3", audio("audio/mpeg")));
    let registry = Arc::new(MockRegistry::new().on_search(
        "Test Radio",
        vec![registry_station("Test Radio", "http://new.example/live.mp3")],
    ));
    let browser = MockBrowser::new();
    let launcher = Arc::new(MockLauncher::new(browser.clone()));

    let finder = StreamFinder::new(&test_config(), http.clone(), registry.clone(), launcher.clone());
    let outcome = finder.discover(dead_station("Test Radio")).await;

    let found = outcome.found.expect("registry stream should be found");
    assert_eq!(found.url, "http://new.example/live.mp3");
    assert_eq!(found.origin, CandidateOrigin::RegistryApi);
    assert_eq!(outcome.stages_tried.len(), 1);
    assert_eq!(outcome.stages_tried[0].stage, Stage::Registry);
    assert_eq!(launcher.launch_count(), 0);
    assert!(browser.navigations().is_empty());
    assert_eq!(registry.searches(), vec!["Test Radio"]);
}

#[tokio::test]
async fn registry_entries_must_pass_strict_validation() {
    let http = Arc::new(
        MockHttp::new()
            .on_probe("http://a.example/stream", ProbeObservation::ok(200, "text/html"))
            .on_probe("http://b.example/live.aac", audio("audio/aac")),
    );
    let registry = Arc::new(MockRegistry::new().on_search(
        "Metro",
        vec![
            registry_station("Metro", "http://a.example/stream"),
            registry_station("Metro", "http://a.example/logo.png"),
            registry_station("Metro", "http://b.example/live.aac"),
        ],
    ));
    let launcher = Arc::new(MockLauncher::new(MockBrowser::new()));

    let finder = StreamFinder::new(&test_config(), http.clone(), registry, launcher);
    let outcome = finder.discover(dead_station("Metro* (Rosario)")).await;

    assert_eq!(outcome.found.unwrap().url, "http://b.example/live.aac");
    // The image never reaches a probe.
    assert_eq!(http.probed(), vec!["http://a.example/stream", "http://b.example/live.aac"]);
}

#[tokio::test]
async fn directory_embed_player_is_followed() {
    let stream = "https://stream.example.net/radiotest.mp3";
    let browser = MockBrowser::new()
        .on_page(
            "https://www.radios-argentinas.org/busca?q=radio+test",
            MockPage::new().element(
                "li.mdc-grid-tile a",
                MockElement::new("tile-1")
                    .attr("href", "https://www.radios-argentinas.org/radio-test")
                    .child(".mdc-grid-tile__title", MockElement::new("tile-1-title").text("Radio Test")),
            ),
        )
        .on_page(
            "https://www.radios-argentinas.org/radio-test",
            MockPage::new().element(
                "[onclick*=\"openPopUp\"]",
                MockElement::new("popup-btn").attr("onclick", "openPopUp('radio-test')"),
            ),
        )
        .on_page(
            "http://e.radios-argentinas.org/embed/radio-test",
            MockPage::new().network(NetworkEvent::ResponseReceived {
                url: stream.to_string(),
                content_type: "audio/mpeg".to_string(),
            }),
        );
    let http = Arc::new(MockHttp::new().on_probe(stream, audio("audio/mpeg")));
    let launcher = Arc::new(MockLauncher::new(browser.clone()));

    let finder = StreamFinder::new(&test_config(), http, Arc::new(MockRegistry::new()), launcher.clone());
    let outcome = finder.discover(dead_station("Radio Test")).await;

    let found = outcome.found.expect("directory stream should be found");
    assert_eq!(found.url, stream);
    assert_eq!(found.origin, CandidateOrigin::Directory);
    assert_eq!(
        browser.navigations(),
        vec![
            "https://www.radios-argentinas.org/busca?q=radio+test",
            "https://www.radios-argentinas.org/radio-test",
            "http://e.radios-argentinas.org/embed/radio-test",
        ]
    );
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(browser.quit_count(), 1);
}

#[tokio::test]
async fn web_search_exact_domain_is_extracted() {
    let candidate = "https://www.cumbiafm.com.ar/";
    let stream = "https://streaming.example.net:8000/cumbia";
    let browser = MockBrowser::new()
        .on_page(
            "https://html.duckduckgo.com/html/?q=radio+Cumbia+FM+live+online&kl=ar-es",
            MockPage::new().element(
                ".result",
                MockElement::new("r1")
                    .child(
                        ".result__a",
                        MockElement::new("r1-link").attr(
                            "href",
                            "//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.cumbiafm.com.ar%2F&rut=x",
                        ),
                    )
                    .child(".result__snippet", MockElement::new("r1-snippet").text("Escuchá Cumbia FM en vivo")),
            ),
        )
        .on_page(
            candidate,
            MockPage::new().element("audio", MockElement::new("player").attr("src", stream)),
        );
    let http = Arc::new(MockHttp::new().on_probe(stream, audio("audio/aacp")));
    let launcher = Arc::new(MockLauncher::new(browser.clone()));

    let finder = StreamFinder::new(&test_config(), http, Arc::new(MockRegistry::new()), launcher.clone());
    let outcome = finder.discover(dead_station("Cumbia FM")).await;

    let found = outcome.found.expect("web search stream should be found");
    assert_eq!(found.url, stream);
    assert_eq!(found.origin, CandidateOrigin::WebSearch);
    let stages: Vec<Stage> = outcome.stages_tried.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec![Stage::Registry, Stage::Directory, Stage::WebSearch]);
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(browser.navigations().last().map(String::as_str), Some(candidate));
}

#[tokio::test]
async fn guessed_site_is_extracted_after_a_play_click() {
    let site = "https://patagoniafm.com.ar";
    let stream = "https://stream.patagoniafm.com.ar:8000/live";
    let browser = MockBrowser::new().on_page(
        site,
        MockPage::new().element(
            "[class*=\"play\"]",
            MockElement::new("btn").on_click(ClickEffect::Network(NetworkEvent::ResponseReceived {
                url: stream.to_string(),
                content_type: "audio/mpeg".to_string(),
            })),
        ),
    );
    // Only the bare-domain guess answers; the www. guess before it does not.
    let http = Arc::new(MockHttp::new().on_site(site).on_probe(stream, audio("audio/mpeg")));
    let launcher = Arc::new(MockLauncher::new(browser.clone()));

    let finder = StreamFinder::new(&test_config(), http.clone(), Arc::new(MockRegistry::new()), launcher);
    let outcome = finder.discover(dead_station("Patagonia FM")).await;

    let found = outcome.found.expect("guessed site stream should be found");
    assert_eq!(found.url, stream);
    assert_eq!(found.origin, CandidateOrigin::PatternGuess);
    let stages: Vec<Stage> = outcome.stages_tried.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Registry, Stage::Directory, Stage::WebSearch, Stage::PatternGuess]
    );
    assert_eq!(browser.clicks(), vec!["btn"]);
    assert!(browser.scripts().is_empty());
    assert_eq!(browser.navigations().last().map(String::as_str), Some(site));
    assert!(!browser.navigations().iter().any(|u| u == "https://www.patagoniafm.com.ar"));
    assert_eq!(http.probe_count(stream), 1);
}

#[tokio::test]
async fn browser_failure_falls_through_every_stage() {
    let launcher = Arc::new(MockLauncher::failing());
    let finder = StreamFinder::new(
        &test_config(),
        Arc::new(MockHttp::new()),
        Arc::new(MockRegistry::new()),
        launcher.clone(),
    );
    let outcome = finder.discover(dead_station("Nowhere FM")).await;

    assert!(outcome.found.is_none());
    assert_eq!(outcome.stages_tried.len(), 4);
    assert!(outcome.stages_tried[1..].iter().all(|s| s.error.is_some()));
    assert!(outcome.last_error.unwrap().contains("Browser unavailable"));
    assert_eq!(launcher.launch_count(), 3);
}

#[tokio::test]
async fn discover_all_reports_each_station() {
    let http = Arc::new(MockHttp::new().on_probe("http://new.example/live.mp3", audio("audio/mpeg")));
    let registry = Arc::new(MockRegistry::new().on_search(
        "Found FM",
        vec![registry_station("Found FM", "http://new.example/live.mp3")],
    ));
    let launcher = Arc::new(MockLauncher::failing());
    let finder = Arc::new(StreamFinder::new(&test_config(), http, registry, launcher));
    let cancelled = Arc::new(AtomicBool::new(false));

    let report = discover_all(
        finder,
        vec![dead_station("Found FM"), dead_station("Lost FM")],
        2,
        &cancelled,
        &NoProgress,
    )
    .await;

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.found_count(), 1);
    assert!(!report.cancelled);
}

// ---------------------------------------------------------------------------
// Page extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn popup_window_is_explored_and_closed() {
    let page = "https://www.popupfm.com.ar/";
    let popup = "https://www.popupfm.com.ar/player";
    let stream = "https://cdn.popupfm.net/live.aac";
    let handler = format!("window.open('{popup}'); return false;");
    let browser = MockBrowser::new()
        .on_page(
            page,
            MockPage::new().element(
                "[class*=\"play\"]",
                MockElement::new("play-btn")
                    .attr("onclick", &handler)
                    .on_click(ClickEffect::OpenWindow(popup.to_string())),
            ),
        )
        .on_page(
            popup,
            MockPage::new().element("audio", MockElement::new("popup-audio").attr("src", stream)),
        );
    let http = Arc::new(MockHttp::new().on_probe(stream, audio("audio/aac")));
    let session = open_session(&browser).await;

    let streams = extractor(http).extract(&session, page).await.unwrap();
    session.close().await;

    assert_eq!(streams, vec![stream]);
    // The handler ran as a script instead of a click.
    assert_eq!(browser.scripts(), vec![handler.replace("return ", "")]);
    assert!(browser.clicks().is_empty());
    assert_eq!(browser.open_windows(), vec!["main"]);
}

#[tokio::test]
async fn player_iframe_is_searched_and_hidden_controls_skipped() {
    let page = "https://www.framefm.com/";
    let frame = "https://player.framefm.com/embed";
    let stream = "https://radio.framefm.com/live.m3u8";
    let browser = MockBrowser::new()
        .on_page(
            page,
            MockPage::new()
                .element("[class*=\"play\"]", MockElement::new("hidden-play").hidden())
                .element("iframe", MockElement::new("ads-frame").attr("src", "https://ads.example.com/banner"))
                .element("iframe", MockElement::new("player-frame").attr("src", frame)),
        )
        .on_page(
            frame,
            MockPage::new().element("source", MockElement::new("frame-source").attr("src", stream)),
        );
    let http = Arc::new(MockHttp::new().on_probe(stream, audio("application/vnd.apple.mpegurl")));
    let session = open_session(&browser).await;

    let streams = extractor(http).extract(&session, page).await.unwrap();
    session.close().await;

    assert_eq!(streams, vec![stream]);
    assert!(browser.clicks().is_empty());
}

#[tokio::test]
async fn popup_is_explored_before_player_iframes() {
    let page = "https://www.dualfm.com.ar/";
    let popup = "https://www.dualfm.com.ar/popup";
    let frame = "https://player.dualfm.com/embed";
    let popup_stream = "https://cdn.dualfm.net/popup.mp3";
    let frame_stream = "https://cdn.dualfm.net/frame.mp3";
    let browser = MockBrowser::new()
        .on_page(
            page,
            MockPage::new()
                .element(
                    "[class*=\"play\"]",
                    MockElement::new("play-btn").on_click(ClickEffect::OpenWindow(popup.to_string())),
                )
                .element("iframe", MockElement::new("player-frame").attr("src", frame)),
        )
        .on_page(
            popup,
            MockPage::new().element("audio", MockElement::new("popup-audio").attr("src", popup_stream)),
        )
        .on_page(
            frame,
            MockPage::new().element("audio", MockElement::new("frame-audio").attr("src", frame_stream)),
        );
    let http = Arc::new(
        MockHttp::new()
            .on_probe(popup_stream, audio("audio/mpeg"))
            .on_probe(frame_stream, audio("audio/mpeg")),
    );
    let session = open_session(&browser).await;

    let streams = extractor(http.clone()).extract(&session, page).await.unwrap();
    session.close().await;

    assert_eq!(streams, vec![popup_stream]);
    assert_eq!(http.probe_count(frame_stream), 0);
    assert_eq!(browser.clicks(), vec!["play-btn"]);
    assert_eq!(browser.open_windows(), vec!["main"]);
}

#[tokio::test]
async fn unverified_candidates_are_dropped() {
    let page = "https://www.fakefm.com/";
    let browser = MockBrowser::new().on_page(
        page,
        MockPage::new()
            .element("audio", MockElement::new("a1").attr("src", "https://fakefm.com/stream/index"))
            .console("player ready"),
    );
    let http = Arc::new(
        MockHttp::new().on_probe("https://fakefm.com/stream/index", ProbeObservation::ok(200, "text/html")),
    );
    let session = open_session(&browser).await;

    let streams = extractor(http.clone()).extract(&session, page).await.unwrap();
    session.close().await;

    assert!(streams.is_empty());
    assert_eq!(http.probe_count("https://fakefm.com/stream/index"), 1);
}

// ---------------------------------------------------------------------------
// Normalizer and registry client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listening_api_is_followed_then_rewritten() {
    let api = "https://emisoraenvivo.com/api/listening/42";
    let http = Arc::new(MockHttp::new().on_json(
        api,
        json!({ "stream": { "data": { "url": "https://17553.live.streamtheworld.com/CADENA3_SC?dist=web" } } }),
    ));
    let normalizer = UrlNormalizer::new(http);

    assert_eq!(
        normalizer.normalize(api).await,
        "https://playerservices.streamtheworld.com/api/livestream-redirect/CADENA3_SC?dist=web"
    );
    assert_eq!(
        normalizer.normalize("https://emisoraenvivo.com/api/listening/404").await,
        "https://emisoraenvivo.com/api/listening/404"
    );
    assert_eq!(
        normalizer.normalize("https://plain.example/live.mp3").await,
        "https://plain.example/live.mp3"
    );
}

#[tokio::test]
async fn radio_browser_client_sends_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/stations/search"))
        .and(query_param("name", "Test Radio"))
        .and(query_param("countrycode", "AR"))
        .and(query_param("order", "votes"))
        .and(query_param("reverse", "true"))
        .and(query_param("hidebroken", "true"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Test Radio", "url": "http://a.example/pls", "url_resolved": "http://a.example/live.mp3" },
            { "name": "Test Radio 2", "url": "http://b.example/live", "url_resolved": "" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = RadioBrowserClient::new(&server.uri(), "AR").unwrap();
    let stations = client.search("Test Radio").await.unwrap();

    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].stream_url(), Some("http://a.example/live.mp3"));
    assert_eq!(stations[1].stream_url(), Some("http://b.example/live"));
}

#[tokio::test]
async fn radio_browser_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = RadioBrowserClient::new(&server.uri(), "AR").unwrap();
    assert!(client.search("Anything").await.is_err());
}
