//! Shared fixtures for the integration suite

use site_archiver::config::Config;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::ResponseTemplate;

/// Creates a fast test configuration writing under `dir/archive`
pub fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.output.root = archive_root(dir).to_string_lossy().into_owned();
    config.crawler.threads = 2;
    config.crawler.claim_timeout_ms = 50;
    config.crawler.request_timeout_secs = 5;
    config.renderer.settle_ms = 0;
    config.renderer.quiescence_timeout_secs = 1;
    config.renderer.poll_interval_ms = 10;
    config.images.compress = false;
    config
}

pub fn archive_root(dir: &TempDir) -> PathBuf {
    dir.path().join("archive")
}

/// An HTML response wrapping `body` in a minimal document
pub fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>Test</title></head><body>{}</body></html>",
            body
        ),
        "text/html; charset=utf-8",
    )
}

/// A 1x1 PNG
pub fn tiny_png() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(1, 1, image::Rgb([200, 10, 10]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode test PNG");
    bytes.into_inner()
}
