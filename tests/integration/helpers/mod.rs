// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use altscan::application::use_cases::scan_use_case::ScanUseCase;
use altscan::config::settings::{DatabaseSettings, ScannerSettings};
use altscan::domain::models::scan_result::ScanResult;
use altscan::domain::services::rate_limiting_service::{NoopRateLimiter, RateLimiter};
use altscan::engines::reqwest_engine::ReqwestFetcher;
use altscan::engines::traits::{FetchError, FetchedPage, PageFetcher, ScanError};
use altscan::engines::validators::{HostResolver, SafeUrl, UrlValidator};
use altscan::infrastructure::database::connection;
use altscan::infrastructure::repositories::scan_result_repo_impl::ScanResultRepositoryImpl;
use altscan::workers::ScanWorker;
use async_trait::async_trait;
use axum::Router;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 等待扫描结束的上限
pub const WAIT: Duration = Duration::from_secs(10);

/// 示例页面：一张有描述、一张装饰性、一张缺失 alt
pub const GALLERY_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Gallery</title></head>
  <body>
    <img src="/images/cat.jpg" alt="A tabby cat asleep on a windowsill" width="640" height="480">
    <img src="/images/divider.png" alt="">
    <img src="/images/hero.png">
  </body>
</html>"#;

#[allow(dead_code)]
pub struct TestApp {
    pub use_case: ScanUseCase,
    pub repository: Arc<ScanResultRepositoryImpl>,
    pub db_pool: Arc<DatabaseConnection>,
}

/// 测试应用的可选配置
pub struct TestOptions {
    pub scanner: ScannerSettings,
    pub resolver: Option<Arc<dyn HostResolver>>,
    pub fetcher: Option<Arc<dyn PageFetcher>>,
    pub scan_limiter: Arc<dyn RateLimiter>,
    pub retry_limiter: Arc<dyn RateLimiter>,
    pub daily_scan_limit: u64,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            scanner: local_scanner_settings(),
            resolver: None,
            fetcher: None,
            scan_limiter: Arc::new(NoopRateLimiter),
            retry_limiter: Arc::new(NoopRateLimiter),
            daily_scan_limit: 0,
        }
    }
}

/// 允许访问本机测试服务器的扫描器配置
pub fn local_scanner_settings() -> ScannerSettings {
    ScannerSettings {
        request_timeout_secs: 5,
        allow_private_networks: true,
        blocked_domains: Vec::new(),
        ..ScannerSettings::default()
    }
}

pub async fn create_test_db() -> Arc<DatabaseConnection> {
    let db = connection::connect_and_migrate(&DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
        min_connections: None,
        connect_timeout: None,
        idle_timeout: None,
    })
    .await
    .expect("Failed to prepare test database");
    Arc::new(db)
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(TestOptions::default()).await
}

pub async fn create_test_app_with(options: TestOptions) -> TestApp {
    let db_pool = create_test_db().await;
    let repository = Arc::new(ScanResultRepositoryImpl::new(db_pool.clone()));

    let validator = Arc::new(match options.resolver {
        Some(resolver) => UrlValidator::with_resolver(&options.scanner, resolver),
        None => UrlValidator::new(&options.scanner),
    });
    let fetcher = options.fetcher.unwrap_or_else(|| {
        Arc::new(ReqwestFetcher::new(&options.scanner, validator.clone()))
    });
    let worker = Arc::new(ScanWorker::new(
        &options.scanner,
        repository.clone(),
        validator,
        fetcher,
    ));

    let use_case = ScanUseCase::new(
        repository.clone(),
        worker,
        options.scan_limiter,
        options.retry_limiter,
        options.daily_scan_limit,
    );

    TestApp {
        use_case,
        repository,
        db_pool,
    }
}

/// 在随机端口上启动 axum 测试服务器
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// 提交扫描并等待终态
pub async fn scan_to_completion(app: &TestApp, url: &str) -> ScanResult {
    let scan = app
        .use_case
        .request_scan(Uuid::new_v4(), url)
        .await
        .expect("Scan request rejected");
    app.use_case.wait_for_terminal(scan.id, WAIT).await.unwrap()
}

/// 固定映射的解析器，未登记的主机解析到公网地址
pub struct StaticResolver {
    hosts: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        let hosts = entries
            .iter()
            .map(|(host, ip)| (host.to_string(), ip.parse().unwrap()))
            .collect();
        Arc::new(Self { hosts })
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
        let ip = self
            .hosts
            .get(host)
            .copied()
            .unwrap_or_else(|| "93.184.216.34".parse().unwrap());
        Ok(vec![SocketAddr::new(ip, port)])
    }
}

/// 只记录调用次数的抓取引擎
#[derive(Default)]
pub struct RecordingFetcher {
    calls: AtomicUsize,
}

impl RecordingFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for RecordingFetcher {
    async fn fetch(&self, _target: SafeUrl) -> Result<FetchedPage, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Network("connection refused".to_string()).into())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
