// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    create_test_app, create_test_app_with, scan_to_completion, TestOptions, GALLERY_PAGE, WAIT,
};
use altscan::application::use_cases::scan_use_case::UseCaseError;
use altscan::domain::models::scan_result::{DomainError, ScanEvent, ScanStatus};
use altscan::domain::repositories::scan_result_repository::{
    ImageQuery, ScanQuery, ScanResultRepository,
};
use altscan::infrastructure::services::rate_limiting_service_impl::GovernorRateLimiter;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gallery_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(GALLERY_PAGE, "text/html"))
        .mount(&server)
        .await;
    server
}

fn is_rejected_retry(err: &UseCaseError) -> bool {
    matches!(
        err,
        UseCaseError::InvalidTransition(DomainError::InvalidStateTransition {
            event: ScanEvent::Retry,
            ..
        })
    )
}

#[tokio::test]
async fn test_request_scan_returns_pending_record() {
    let server = gallery_server().await;
    let app = create_test_app().await;
    let user_id = Uuid::new_v4();

    let scan = app
        .use_case
        .request_scan(user_id, &format!("{}/gallery#top", server.uri()))
        .await
        .unwrap();

    assert_eq!(scan.status, ScanStatus::Pending);
    assert_eq!(scan.user_id, user_id);
    assert_eq!(scan.total_images, 0);
    assert!(!scan.url.contains('#'));

    let finished = app.use_case.wait_for_terminal(scan.id, WAIT).await.unwrap();
    assert_eq!(finished.status, ScanStatus::Completed);
}

#[tokio::test]
async fn test_unparseable_url_creates_no_record() {
    let app = create_test_app().await;
    let user_id = Uuid::new_v4();

    let err = app
        .use_case
        .request_scan(user_id, "not a url")
        .await
        .unwrap_err();
    assert!(matches!(err, UseCaseError::InvalidUrl(_)));

    let scans = app
        .use_case
        .list_scans(user_id, &ScanQuery::default())
        .await
        .unwrap();
    assert!(scans.is_empty());
}

#[tokio::test]
async fn test_unsupported_scheme_fails_in_pipeline() {
    let app = create_test_app().await;

    let scan = scan_to_completion(&app, "ftp://files.example.com/pub/").await;

    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("validation_error:"));
}

#[tokio::test]
async fn test_scan_requests_are_rate_limited_per_user() {
    let server = gallery_server().await;
    let app = create_test_app_with(TestOptions {
        scan_limiter: Arc::new(GovernorRateLimiter::new(1, Duration::from_secs(60))),
        ..TestOptions::default()
    })
    .await;
    let url = format!("{}/gallery", server.uri());
    let user_id = Uuid::new_v4();

    app.use_case.request_scan(user_id, &url).await.unwrap();
    let err = app.use_case.request_scan(user_id, &url).await.unwrap_err();
    assert!(matches!(err, UseCaseError::RateLimited));

    // Other users have their own budget
    app.use_case
        .request_scan(Uuid::new_v4(), &url)
        .await
        .unwrap();

    let scans = app
        .use_case
        .list_scans(user_id, &ScanQuery::default())
        .await
        .unwrap();
    assert_eq!(scans.len(), 1);
}

#[tokio::test]
async fn test_daily_quota_is_enforced() {
    let server = gallery_server().await;
    let app = create_test_app_with(TestOptions {
        daily_scan_limit: 2,
        ..TestOptions::default()
    })
    .await;
    let url = format!("{}/gallery", server.uri());
    let user_id = Uuid::new_v4();

    app.use_case.request_scan(user_id, &url).await.unwrap();
    app.use_case.request_scan(user_id, &url).await.unwrap();
    let err = app.use_case.request_scan(user_id, &url).await.unwrap_err();

    assert!(matches!(err, UseCaseError::QuotaExceeded { limit: 2 }));
}

#[tokio::test]
async fn test_daily_quota_holds_under_concurrent_requests() {
    let server = gallery_server().await;
    let app = create_test_app_with(TestOptions {
        daily_scan_limit: 1,
        ..TestOptions::default()
    })
    .await;
    let url = format!("{}/gallery", server.uri());
    let user_id = Uuid::new_v4();

    let results = join_all((0..5).map(|_| app.use_case.request_scan(user_id, &url))).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let over_quota = results
        .iter()
        .filter(|r| matches!(r, Err(UseCaseError::QuotaExceeded { limit: 1 })))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(over_quota, 4);

    let scans = app
        .use_case
        .list_scans(user_id, &ScanQuery::default())
        .await
        .unwrap();
    assert_eq!(scans.len(), 1);
}

#[tokio::test]
async fn test_retry_of_completed_scan_is_rejected() {
    let server = gallery_server().await;
    let app = create_test_app().await;
    let completed = scan_to_completion(&app, &format!("{}/gallery", server.uri())).await;
    assert_eq!(completed.status, ScanStatus::Completed);

    let err = app.use_case.retry_scan(completed.id).await.unwrap_err();
    assert!(is_rejected_retry(&err), "{:?}", err);

    let stored = app.use_case.get_scan(completed.id).await.unwrap();
    assert_eq!(stored, completed);
    let images = app
        .use_case
        .list_images(completed.id, &ImageQuery::default())
        .await
        .unwrap();
    assert_eq!(images.len(), 3);
}

#[tokio::test]
async fn test_second_retry_is_rejected_while_first_is_active() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(GALLERY_PAGE, "text/html")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let failed = scan_to_completion(&app, &format!("{}/slow", server.uri())).await;
    assert_eq!(failed.status, ScanStatus::Failed);

    app.use_case.retry_scan(failed.id).await.unwrap();
    let err = app.use_case.retry_scan(failed.id).await.unwrap_err();
    assert!(is_rejected_retry(&err), "{:?}", err);

    let completed = app.use_case.wait_for_terminal(failed.id, WAIT).await.unwrap();
    assert_eq!(completed.status, ScanStatus::Completed);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_scan_is_not_found() {
    let app = create_test_app().await;
    let id = Uuid::new_v4();

    assert!(matches!(
        app.use_case.get_scan(id).await,
        Err(UseCaseError::NotFound)
    ));
    assert!(matches!(
        app.use_case.retry_scan(id).await,
        Err(UseCaseError::NotFound)
    ));
    assert!(matches!(
        app.use_case.list_images(id, &ImageQuery::default()).await,
        Err(UseCaseError::NotFound)
    ));
    assert!(matches!(
        app.use_case.delete_scan(id).await,
        Err(UseCaseError::NotFound)
    ));
}

#[tokio::test]
async fn test_delete_scan_removes_record_and_images() {
    let server = gallery_server().await;
    let app = create_test_app().await;
    let scan = scan_to_completion(&app, &format!("{}/gallery", server.uri())).await;

    app.use_case.delete_scan(scan.id).await.unwrap();

    assert!(matches!(
        app.use_case.get_scan(scan.id).await,
        Err(UseCaseError::NotFound)
    ));
    assert!(app
        .repository
        .list_images(scan.id, &ImageQuery::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_rejected_retry_does_not_spend_retry_budget() {
    let server = gallery_server().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = create_test_app_with(TestOptions {
        retry_limiter: Arc::new(GovernorRateLimiter::new(1, Duration::from_secs(60))),
        ..TestOptions::default()
    })
    .await;
    let user_id = Uuid::new_v4();

    let completed = app
        .use_case
        .request_scan(user_id, &format!("{}/gallery", server.uri()))
        .await
        .unwrap();
    let completed = app.use_case.wait_for_terminal(completed.id, WAIT).await.unwrap();
    assert_eq!(completed.status, ScanStatus::Completed);

    let failed = app
        .use_case
        .request_scan(user_id, &format!("{}/broken", server.uri()))
        .await
        .unwrap();
    let failed = app.use_case.wait_for_terminal(failed.id, WAIT).await.unwrap();
    assert_eq!(failed.status, ScanStatus::Failed);

    let err = app.use_case.retry_scan(completed.id).await.unwrap_err();
    assert!(is_rejected_retry(&err), "{:?}", err);

    let pending = app.use_case.retry_scan(failed.id).await.unwrap();
    assert_eq!(pending.status, ScanStatus::Pending);
}
