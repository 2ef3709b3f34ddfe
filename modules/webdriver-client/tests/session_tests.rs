//! Protocol tests against a mocked chromedriver.

use serde_json::json;
use webdriver_client::{chrome_capabilities, ElementRef, WebDriverClient, WebDriverError, ELEMENT_KEY};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn session_on(server: &MockServer) -> webdriver_client::Session {
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s1", "capabilities": {} }
        })))
        .mount(server)
        .await;

    let client = WebDriverClient::new(&format!("{}/", server.uri())).unwrap();
    client.new_session(&chrome_capabilities(true)).await.unwrap()
}

#[tokio::test]
async fn creates_session_and_navigates() {
    let server = MockServer::start().await;
    let session = session_on(&server).await;
    assert_eq!(session.id(), "s1");

    Mock::given(method("POST"))
        .and(path("/session/s1/url"))
        .and(body_json(json!({ "url": "https://radio.example/" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    session.navigate("https://radio.example/").await.unwrap();
}

#[tokio::test]
async fn finds_elements_by_css() {
    let server = MockServer::start().await;
    let session = session_on(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s1/elements"))
        .and(body_json(json!({ "using": "css selector", "value": "audio" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [ { ELEMENT_KEY: "e1" }, { ELEMENT_KEY: "e2" } ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/session/s1/element/e1/attribute/src"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": "https://cdn.example/live.mp3"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/session/s1/element/e2/attribute/src"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .mount(&server)
        .await;

    let found = session.find_elements("audio").await.unwrap();
    assert_eq!(found, vec![ElementRef("e1".into()), ElementRef("e2".into())]);
    assert_eq!(
        session.attribute(&found[0], "src").await.unwrap().as_deref(),
        Some("https://cdn.example/live.mp3")
    );
    assert_eq!(session.attribute(&found[1], "src").await.unwrap(), None);
}

#[tokio::test]
async fn driver_errors_are_typed() {
    let server = MockServer::start().await;
    let session = session_on(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s1/element/gone/click"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": {
                "error": "stale element reference",
                "message": "element is not attached to the page document",
                "stacktrace": ""
            }
        })))
        .mount(&server)
        .await;

    let err = session.click(&ElementRef("gone".into())).await.unwrap_err();
    assert!(err.is_stale());
    match err {
        WebDriverError::Api { status, error, .. } => {
            assert_eq!(status, 404);
            assert_eq!(error, "stale element reference");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn reads_log_buffers_and_windows() {
    let server = MockServer::start().await;
    let session = session_on(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s1/se/log"))
        .and(body_json(json!({ "type": "browser" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [ { "level": "SEVERE", "message": "player failed", "timestamp": 1700000000000i64 } ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/session/s1/window/handles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": ["w1", "w2"] })))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/session/s1/window"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": ["w1"] })))
        .mount(&server)
        .await;

    let logs = session.logs("browser").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, "SEVERE");

    assert_eq!(session.window_handles().await.unwrap(), vec!["w1", "w2"]);
    assert_eq!(session.close_window().await.unwrap(), vec!["w1"]);
}

#[tokio::test]
async fn screenshot_is_decoded() {
    let server = MockServer::start().await;
    let session = session_on(&server).await;

    Mock::given(method("GET"))
        .and(path("/session/s1/screenshot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "iVBORw0=" })))
        .mount(&server)
        .await;

    let png = session.screenshot().await.unwrap();
    assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn delete_ends_session() {
    let server = MockServer::start().await;
    let session = session_on(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/session/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    session.delete().await.unwrap();
}
