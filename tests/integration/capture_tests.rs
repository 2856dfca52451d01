//! Archive sessions driven through a scripted renderer

use crate::support::{archive_root, create_test_config, html_page};
use site_archiver::render::{NetworkRecord, StubRenderer};
use site_archiver::{Coordinator, CrawlTarget};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_dynamic_responses_injected_into_page() {
    let mock_server = MockServer::start().await;
    let home = format!("{}/", mock_server.uri());
    let api = format!("{}/api/items", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"items":[1,2,3]}"#, "application/json"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // The rendered page is served by the renderer, never fetched
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("static"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let renderer = StubRenderer::new()
        .with_page(
            &home,
            "<html><head><title>App</title></head><body><ul id=\"items\"><li>1</li></ul></body></html>",
        )
        .with_request(&home, NetworkRecord::new(&api, "fetch"))
        .with_request(
            &home,
            NetworkRecord::new(format!("{}/static/app.js", mock_server.uri()), "script"),
        );

    let dir = TempDir::new().unwrap();
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();
    let coordinator =
        Coordinator::with_renderer(target, create_test_config(&dir), Box::new(renderer)).unwrap();

    let summary = coordinator.run().await.expect("Archive failed");
    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.captures, 1);

    let saved = std::fs::read_to_string(archive_root(&dir).join("index.html")).unwrap();
    assert!(saved.contains(r#"<ul id="items"><li>1</li></ul>"#));

    let script_start = saved.find("<script>window.ajaxData = ").unwrap();
    assert!(script_start < saved.find("</head>").unwrap());
    assert!(saved.contains(&api));
    assert!(saved.contains(r#"{\"items\":[1,2,3]}"#));
}

#[tokio::test]
async fn test_unrendered_page_falls_back_to_fetch() {
    let mock_server = MockServer::start().await;
    let home = format!("{}/", mock_server.uri());
    let plain = format!("{}/plain", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(html_page("<p>fetched directly</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let renderer = StubRenderer::new().with_page(
        &home,
        r#"<html><head></head><body><a href="/plain">plain</a></body></html>"#,
    );
    let navigations = renderer.navigations();

    let dir = TempDir::new().unwrap();
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();
    let summary = Coordinator::with_renderer(target, create_test_config(&dir), Box::new(renderer))
        .unwrap()
        .run()
        .await
        .expect("Archive failed");

    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.pages_failed, 0);

    let visited = navigations.lock().unwrap().clone();
    assert!(visited.contains(&home));
    assert!(visited.contains(&plain));

    let saved =
        std::fs::read_to_string(archive_root(&dir).join("plain").join("index.html")).unwrap();
    assert!(saved.contains("<p>fetched directly</p>"));
    assert!(!saved.contains("window.ajaxData"));
}

#[tokio::test]
async fn test_unavailable_browser_disables_capture() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/next">next</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page("next"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let renderer = StubRenderer::new().unavailable();
    let navigations = renderer.navigations();

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.crawler.threads = 1;
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();

    let summary = Coordinator::with_renderer(target, config, Box::new(renderer))
        .unwrap()
        .run()
        .await
        .expect("Archive failed");

    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.pages_failed, 0);
    // Only the first page tried the browser
    assert_eq!(navigations.lock().unwrap().len(), 1);
}
