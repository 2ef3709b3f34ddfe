use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use radiocheck_common::{OutcomeKind, Station};
use radiocheck_scout::pipeline::NoProgress;
use radiocheck_scout::verification::{
    classify, verify_all, HostCache, HttpProber, ProbeObservation, StreamHttp, Verifier,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn verifier(timeout: Duration) -> (Verifier, Arc<HostCache>) {
    let http = Arc::new(HttpProber::new(timeout).unwrap());
    let cache = Arc::new(HostCache::new());
    (Verifier::new(http, cache.clone(), timeout), cache)
}

fn station(name: &str, url: &str) -> Station {
    Station::new(name, "101.5", url, 1)
}

#[tokio::test]
async fn second_station_on_same_host_uses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.mp3"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "audio/mpeg"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.mp3"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "audio/mpeg"))
        .expect(0)
        .mount(&server)
        .await;

    let (verifier, cache) = verifier(Duration::from_secs(5));
    let first = verifier
        .verify(station("A", &format!("{}/a.mp3", server.uri())))
        .await;
    let second = verifier
        .verify(station("B", &format!("{}/b.mp3", server.uri())))
        .await;

    assert!(first.outcome.is_alive());
    assert!(!first.cached);
    assert!(second.outcome.is_alive());
    assert!(second.cached);
    assert!(second.outcome.detail().starts_with("(cache)"));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn probe_sends_stream_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live"))
        .and(header("icy-metadata", "1"))
        .and(header("accept", "*/*"))
        .respond_with(ResponseTemplate::new(200).insert_header("icy-name", "Test FM"))
        .expect(1)
        .mount(&server)
        .await;

    let (verifier, _) = verifier(Duration::from_secs(5));
    let result = verifier
        .verify(station("Test FM", &format!("{}/live", server.uri())))
        .await;
    assert_eq!(result.outcome.kind(), OutcomeKind::Alive);
}

#[tokio::test]
async fn html_and_missing_pages_are_dead() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let http = HttpProber::new(Duration::from_secs(5)).unwrap();
    let html = http
        .probe(&format!("{}/page", server.uri()), Duration::from_secs(5))
        .await;
    let missing = http
        .probe(&format!("{}/nothing", server.uri()), Duration::from_secs(5))
        .await;

    assert_eq!(classify(&html).kind(), OutcomeKind::Dead);
    assert_eq!(classify(&missing).kind(), OutcomeKind::Dead);
    assert_eq!(classify(&missing).detail(), "404");
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (verifier, _) = verifier(Duration::from_millis(300));
    let result = verifier
        .verify(station("Slow", &format!("{}/slow.mp3", server.uri())))
        .await;
    assert_eq!(result.outcome.kind(), OutcomeKind::Timeout);
    assert!(result.outcome.needs_discovery());
}

#[tokio::test]
async fn refused_connection_is_dead() {
    let (verifier, _) = verifier(Duration::from_secs(2));
    let result = verifier.verify(station("Gone", "http://127.0.0.1:1/stream")).await;
    assert_eq!(result.outcome.kind(), OutcomeKind::Dead);
}

#[tokio::test]
async fn refused_connection_is_dead_whatever_the_path() {
    let http = HttpProber::new(Duration::from_secs(2)).unwrap();
    for url in [
        "http://127.0.0.1:1/classlive",
        "http://127.0.0.1:1/tls-radio",
        "http://127.0.0.1:1/ssl/handshake.mp3",
    ] {
        let observation = http.probe(url, Duration::from_secs(2)).await;
        assert!(
            matches!(observation, ProbeObservation::Transport(_)),
            "{url}: {observation:?}"
        );
        assert_eq!(classify(&observation).kind(), OutcomeKind::Dead, "{url}");
    }
}

#[tokio::test]
async fn coordinator_reports_every_station() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.mp3"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "audio/mpeg"))
        .mount(&server)
        .await;

    let (verifier, _) = verifier(Duration::from_secs(5));
    let stations = vec![
        station("Ok", &format!("{}/ok.mp3", server.uri())),
        station("Gone", "http://127.0.0.1:1/stream"),
    ];
    let cancelled = Arc::new(AtomicBool::new(false));
    let report = verify_all(&verifier, stations, 30, &cancelled, &NoProgress).await;

    assert_eq!(report.results.len(), 2);
    assert!(!report.cancelled);
    assert_eq!(report.count(OutcomeKind::Alive), 1);
    assert_eq!(report.count(OutcomeKind::Dead), 1);
    let queued = report.needing_discovery();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].name, "Gone");
}

#[tokio::test]
async fn cancelled_run_starts_nothing() {
    let (verifier, _) = verifier(Duration::from_secs(2));
    let cancelled = Arc::new(AtomicBool::new(true));
    let report = verify_all(
        &verifier,
        vec![station("A", "http://127.0.0.1:1/a")],
        30,
        &cancelled,
        &NoProgress,
    )
    .await;
    assert!(report.results.is_empty());
    assert!(report.cancelled);
}
