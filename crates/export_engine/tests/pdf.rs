mod common;

use std::sync::Arc;

use common::FakeRenderer;
use export_engine::{FailureKind, PageExporter, PdfExportOptions, PdfExporter};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use url::Url;

const ARTICLE: &str = r#"<html><body>
  <header>Site chrome</header>
  <div class="MainContent"><h1>Spring</h1><img src="img/tree.png"></div>
</body></html>"#;

fn renderer() -> FakeRenderer {
    FakeRenderer::with_pages(&[("https://news.example.com/2024/spring.html", ARTICLE)])
}

#[tokio::test]
async fn whole_page_is_printed_without_backgrounds() {
    let fake = renderer();
    let exporter = PdfExporter::new(Arc::new(fake.clone()), PdfExportOptions::default());
    let out = TempDir::new().unwrap();
    let target = out.path().join("SPRING.pdf");

    let written = exporter
        .export_pdf("https://news.example.com/2024/spring.html", &target)
        .await
        .unwrap();

    let bytes = std::fs::read(&target).unwrap();
    assert_eq!(written, bytes.len() as u64);
    assert!(bytes.starts_with(b"%PDF"));
    assert!(String::from_utf8_lossy(&bytes).contains("Site chrome"));

    let log = fake.log.lock().unwrap();
    assert_eq!((log.opened, log.closed), (1, 1));
    assert_eq!(log.printed.len(), 1);
    assert!(!log.printed[0].print_background);
    assert!((log.printed[0].paper_width_in - 8.27).abs() < f64::EPSILON);
}

#[tokio::test]
async fn subtree_is_isolated_into_standalone_document() {
    let fake = renderer();
    let options = PdfExportOptions {
        target_element: Some("div.MainContent".to_string()),
        ..PdfExportOptions::default()
    };
    let exporter = PdfExporter::new(Arc::new(fake.clone()), options);
    let out = TempDir::new().unwrap();
    let target = out.path().join("SPRING.pdf");

    exporter
        .export_pdf("https://news.example.com/2024/spring.html", &target)
        .await
        .unwrap();

    let printed = String::from_utf8_lossy(&std::fs::read(&target).unwrap()).into_owned();
    assert!(printed.contains("<h1>Spring</h1>"));
    assert!(!printed.contains("Site chrome"));

    let log = fake.log.lock().unwrap();
    assert_eq!((log.opened, log.closed), (2, 2));
    assert_eq!(log.viewports, vec![(1280, 800)]);
    assert_eq!(log.contents.len(), 1);
    assert!(log.contents[0].contains("<base href=\"https://news.example.com/\">"));
    assert!(log.printed[0].print_background);
}

#[tokio::test]
async fn explicit_asset_base_overrides_origin() {
    let fake = renderer();
    let options = PdfExportOptions {
        target_element: Some("div.MainContent".to_string()),
        asset_base_url: Some(Url::parse("https://cdn.example.com/assets/").unwrap()),
        ..PdfExportOptions::default()
    };
    let exporter = PdfExporter::new(Arc::new(fake.clone()), options);
    let out = TempDir::new().unwrap();

    exporter
        .export_pdf(
            "https://news.example.com/2024/spring.html",
            &out.path().join("S.pdf"),
        )
        .await
        .unwrap();
    let log = fake.log.lock().unwrap();
    assert!(log.contents[0].contains("<base href=\"https://cdn.example.com/assets/\">"));
}

#[tokio::test]
async fn missing_subtree_fails_and_closes_page() {
    let fake = renderer();
    let options = PdfExportOptions {
        target_element: Some("#does-not-exist".to_string()),
        ..PdfExportOptions::default()
    };
    let exporter = PdfExporter::new(Arc::new(fake.clone()), options);
    let out = TempDir::new().unwrap();
    let target = out.path().join("X.pdf");

    let err = exporter
        .export_pdf("https://news.example.com/2024/spring.html", &target)
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::SelectorMissing {
            selector: "#does-not-exist".to_string()
        }
    );
    assert!(!target.exists());
    let log = fake.log.lock().unwrap();
    assert_eq!((log.opened, log.closed), (1, 1));
}

#[tokio::test]
async fn navigation_timeout_is_a_failure() {
    let fake = renderer();
    let exporter = PdfExporter::new(Arc::new(fake.clone()), PdfExportOptions::default());
    let out = TempDir::new().unwrap();

    let err = exporter
        .export_pdf("https://news.example.com/slow", &out.path().join("S.pdf"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
    assert_eq!(fake.log.lock().unwrap().closed, 1);
}
