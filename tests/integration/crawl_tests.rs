//! End-to-end archive sessions without a headless browser
//!
//! These tests use wiremock to serve a small site and check the snapshot
//! the archiver writes for it.

use crate::support::{archive_root, create_test_config, html_page, tiny_png};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use site_archiver::{Coordinator, CrawlTarget};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_archive_inlines_in_scope_resources() {
    let mock_server = MockServer::start().await;
    let png = tiny_png();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Home</title>
<link rel="stylesheet" href="/style.css" media="screen">
<script src="https://cdn.other.com/lib.js"></script>
<script src="/app.js"></script>
</head><body>
<img src="/logo.png" alt="Logo">
<img src="/logo.png" class="footer">
</body></html>"#,
            "text/html",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("body { background: url(bg.png); }", "text/css"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("document.title = '</script>';", "application/javascript"),
        )
        .mount(&mock_server)
        .await;

    // Referenced twice but fetched once per session
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png.clone(), "image/png"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bg.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png.clone(), "image/png"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();
    let coordinator = Coordinator::without_renderer(target, create_test_config(&dir)).unwrap();

    let summary = coordinator.run().await.expect("Archive failed");
    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.pages_failed, 0);
    assert!(coordinator.session().is_visited(&format!("{}/", mock_server.uri())));

    let home = std::fs::read_to_string(archive_root(&dir).join("index.html")).unwrap();
    let png_uri = format!("data:image/png;base64,{}", STANDARD.encode(&png));

    assert!(home.contains(&format!(r#"<img src="{}" alt="Logo">"#, png_uri)));
    assert!(home.contains(r#"<style media="screen">body { background: url("data:image/png;base64,"#));
    assert!(!home.contains("/style.css"));
    assert!(home.contains(r#"<script src="https://cdn.other.com/lib.js"></script>"#));
    assert!(home.contains(r#"<script>document.title = '<\/script>';</script>"#));
    assert!(home.contains(&format!(r#"<img src="{}" class="footer">"#, png_uri)));
}

#[tokio::test]
async fn test_stop_signal_halts_claiming() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="/one">1</a><a href="/two">2</a><a href="/three">3</a>"#,
        ))
        .mount(&mock_server)
        .await;

    for page in ["/one", "/two", "/three"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html_page("leaf"))
            .expect(0)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.crawler.threads = 1;
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();

    let coordinator = Coordinator::without_renderer(target, config).unwrap();
    let stop = coordinator.stop_handle();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let coordinator = coordinator.with_progress(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        stop.stop();
    });

    let summary = coordinator.run().await.expect("Archive failed");

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(archive_root(&dir).join("index.html").exists());
    assert!(!archive_root(&dir).join("one").exists());
}

#[tokio::test]
async fn test_stop_during_slow_response_finishes_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            html_page(r#"<a href="/one">1</a>"#).set_delay(Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(html_page("leaf"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();
    let coordinator = Coordinator::without_renderer(target, create_test_config(&dir)).unwrap();

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.stop();
    });

    let summary = coordinator.run().await.expect("Archive failed");

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.pages_failed, 0);
    assert!(archive_root(&dir).join("index.html").exists());
    assert!(!archive_root(&dir).join("one").exists());
}

#[tokio::test]
async fn test_progress_reports_every_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/a">a</a><a href="/b">b</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page("a"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();
    let reported = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);

    let summary = Coordinator::without_renderer(target, create_test_config(&dir))
        .unwrap()
        .with_progress(move |count, url| sink.lock().unwrap().push((count, url.to_string())))
        .run()
        .await
        .expect("Archive failed");

    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.pages_failed, 1);

    let reported = reported.lock().unwrap();
    assert_eq!(reported.len(), 3);
    assert!(reported.iter().any(|(_, url)| url.ends_with("/b")));
}

#[tokio::test]
async fn test_large_page_written_compressed() {
    let mock_server = MockServer::start().await;
    let paragraph = "<p>archived text that repeats</p>".repeat(200);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/big">big</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(html_page(&paragraph))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.output.html_compress_threshold_kb = 1;
    let target = CrawlTarget::new(&mock_server.uri()).unwrap();

    Coordinator::without_renderer(target, config)
        .unwrap()
        .run()
        .await
        .expect("Archive failed");

    let big_dir = archive_root(&dir).join("big");
    assert!(!big_dir.join("index.html").exists());

    let file = std::fs::File::open(big_dir.join("index.html.gz")).unwrap();
    let mut html = String::new();
    GzDecoder::new(file).read_to_string(&mut html).unwrap();
    assert!(html.contains(&paragraph));

    // The small home page stays plain
    assert!(archive_root(&dir).join("index.html").exists());
    assert!(!archive_root(&dir).join("index.html.gz").exists());
}

#[tokio::test]
async fn test_scope_prefix_limits_crawl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(html_page(
            r#"<a href="/docs/guide">guide</a><a href="/blog/post">post</a>"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/guide"))
        .respond_with(html_page("guide"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(html_page("post"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let origin = format!("{}/docs/", mock_server.uri());
    let target = CrawlTarget::new(&origin)
        .unwrap()
        .with_scope_prefix(&origin)
        .unwrap();

    let summary = Coordinator::without_renderer(target, create_test_config(&dir))
        .unwrap()
        .run()
        .await
        .expect("Archive failed");

    assert_eq!(summary.pages_visited, 2);
    assert!(archive_root(&dir).join("docs").join("guide").join("index.html").exists());
    assert!(!archive_root(&dir).join("blog").exists());
}
