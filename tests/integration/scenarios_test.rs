// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    create_test_app, create_test_app_with, scan_to_completion, spawn_server,
    RecordingFetcher, StaticResolver, TestOptions, GALLERY_PAGE, WAIT,
};
use altscan::config::settings::ScannerSettings;
use altscan::domain::models::scan_result::ScanStatus;
use altscan::domain::repositories::scan_result_repository::ImageQuery;
use altscan::domain::services::coverage_aggregator::aggregate;
use axum::{body::Body, http::header, response::Response, routing::get, Router};
use bytes::Bytes;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 场景 A：三张图片的页面
///
/// 一张有描述、一张装饰性、一张缺失 alt，覆盖率 66.7%
#[tokio::test]
async fn test_gallery_page_is_audited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(GALLERY_PAGE, "text/html"))
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let scan = scan_to_completion(&app, &format!("{}/gallery", server.uri())).await;

    assert_eq!(scan.status, ScanStatus::Completed);
    assert_eq!(scan.total_images, 3);
    assert_eq!(scan.images_with_alt, 2);
    assert_eq!(scan.images_missing_alt, 1);
    assert_eq!(scan.alt_text_coverage_percentage, 66.7);
    assert_eq!(scan.missing_alt_percentage(), 33.3);
    assert!(scan.error_message.is_none());
    assert!(scan.scan_duration_ms.is_some());

    let images = app
        .use_case
        .list_images(scan.id, &ImageQuery::default())
        .await
        .unwrap();
    assert_eq!(images.len(), 3);
    assert_eq!(
        images[0].image_url,
        format!("{}/images/cat.jpg", server.uri())
    );
    assert_eq!(images[0].image_width, Some(640));
    assert!(images[1].has_alt_text);
    assert!(images[1].is_decorative);
    assert!(!images[2].has_alt_text);
    assert!(images[2].alt_text.is_none());

    let summary = aggregate(&images);
    assert_eq!(summary.decorative_images, 1);
    assert_eq!(summary.quality_breakdown.missing, 1);
    assert_eq!(summary.quality_breakdown.decorative, 1);

    let missing_only = app
        .use_case
        .list_images(
            scan.id,
            &ImageQuery {
                has_alt_text: Some(false),
                ..ImageQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(missing_only.len(), 1);
    assert_eq!(missing_only[0].position, 2);
}

/// 场景 B：主机解析到私有地址
///
/// 扫描失败且从未发起抓取，错误信息不泄露地址
#[tokio::test]
async fn test_private_destination_is_blocked() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let app = create_test_app_with(TestOptions {
        scanner: ScannerSettings::default(),
        resolver: Some(StaticResolver::new(&[("intranet.example.test", "192.168.1.5")])),
        fetcher: Some(fetcher.clone()),
        ..TestOptions::default()
    })
    .await;

    let scan = scan_to_completion(&app, "http://intranet.example.test/dashboard").await;

    assert_eq!(scan.status, ScanStatus::Failed);
    let message = scan.error_message.clone().unwrap();
    assert!(message.starts_with("ssrf_blocked:"), "{}", message);
    assert!(!message.contains("192.168.1.5"));
    assert_eq!(scan.total_images, 0);
    assert_eq!(fetcher.calls(), 0);
    assert!(app
        .use_case
        .list_images(scan.id, &ImageQuery::default())
        .await
        .unwrap()
        .is_empty());
}

/// 回环、私有、链路本地与 IPv6 回环地址一律被拦截
#[tokio::test]
async fn test_reserved_addresses_never_reach_the_fetcher() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let app = create_test_app_with(TestOptions {
        scanner: ScannerSettings::default(),
        resolver: Some(StaticResolver::new(&[])),
        fetcher: Some(fetcher.clone()),
        ..TestOptions::default()
    })
    .await;

    for url in [
        "http://127.0.0.1/",
        "http://10.20.30.40:8080/admin",
        "http://169.254.169.254/latest/meta-data/",
        "http://[::1]/",
    ] {
        let scan = scan_to_completion(&app, url).await;
        assert_eq!(scan.status, ScanStatus::Failed, "{}", url);
        assert!(
            scan.error_message
                .as_deref()
                .unwrap()
                .starts_with("ssrf_blocked:"),
            "{}",
            url
        );
    }
    assert_eq!(fetcher.calls(), 0);
}

/// 场景 C：分块传输的响应体超过上限
#[tokio::test]
async fn test_oversized_stream_fails_the_scan() {
    let router = Router::new().route(
        "/huge",
        get(|| async {
            let chunks =
                (0..64).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![b'a'; 1024])));
            Response::builder()
                .header(header::CONTENT_TYPE, "text/html")
                .body(Body::from_stream(futures::stream::iter(chunks)))
                .unwrap()
        }),
    );
    let addr = spawn_server(router).await;

    let mut options = TestOptions::default();
    options.scanner.max_body_bytes = 16 * 1024;
    let app = create_test_app_with(options).await;

    let scan = scan_to_completion(&app, &format!("http://{}/huge", addr)).await;

    assert_eq!(scan.status, ScanStatus::Failed);
    assert_eq!(
        scan.error_message.as_deref(),
        Some("fetch_error: response body exceeds 16384 bytes")
    );
    assert_eq!(scan.total_images, 0);
    assert!(scan.scan_duration_ms.is_some());
}

/// 场景 D：首次抓取返回 500，重试成功
#[tokio::test]
async fn test_retry_after_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(GALLERY_PAGE, "text/html"))
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let failed = scan_to_completion(&app, &format!("{}/flaky", server.uri())).await;
    assert_eq!(failed.status, ScanStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("fetch_error: upstream returned HTTP 500")
    );

    let pending = app.use_case.retry_scan(failed.id).await.unwrap();
    assert_eq!(pending.id, failed.id);
    assert_eq!(pending.status, ScanStatus::Pending);
    assert!(pending.error_message.is_none());

    let completed = app.use_case.wait_for_terminal(failed.id, WAIT).await.unwrap();
    assert_eq!(completed.status, ScanStatus::Completed);
    assert!(completed.error_message.is_none());
    assert_eq!(completed.total_images, 3);
    assert_eq!(completed.alt_text_coverage_percentage, 66.7);
    assert_eq!(completed.created_at, failed.created_at);

    let images = app
        .use_case
        .list_images(failed.id, &ImageQuery::default())
        .await
        .unwrap();
    assert_eq!(images.len(), 3);
}

/// 非 HTML 响应以 fetch_error 结束
#[tokio::test]
async fn test_non_html_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"),
        )
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let scan = scan_to_completion(&app, &format!("{}/report.pdf", server.uri())).await;

    assert_eq!(scan.status, ScanStatus::Failed);
    assert_eq!(
        scan.error_message.as_deref(),
        Some("fetch_error: unsupported content type 'application/pdf'")
    );
}

/// 没有图片的页面以 0% 覆盖率完成
#[tokio::test]
async fn test_page_without_images_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body><p>Just words.</p></body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let scan = scan_to_completion(&app, &format!("{}/text", server.uri())).await;

    assert_eq!(scan.status, ScanStatus::Completed);
    assert_eq!(scan.total_images, 0);
    assert_eq!(scan.alt_text_coverage_percentage, 0.0);
}
