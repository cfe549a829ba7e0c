// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use altscan::application::use_cases::scan_use_case::ScanUseCase;
use altscan::config::settings::Settings;
use altscan::domain::models::image_detail::ImageDetail;
use altscan::domain::models::scan_result::{ScanResult, ScanStatus};
use altscan::domain::repositories::scan_result_repository::{
    ImageQuery, ScanQuery, MAX_PAGE_SIZE,
};
use altscan::domain::services::coverage_aggregator::{aggregate, QualityBreakdown};
use altscan::domain::services::rate_limiting_service::{NoopRateLimiter, RateLimiter};
use altscan::engines::reqwest_engine::ReqwestFetcher;
use altscan::engines::validators::UrlValidator;
use altscan::infrastructure::database::connection;
use altscan::infrastructure::metrics;
use altscan::infrastructure::repositories::scan_result_repo_impl::ScanResultRepositoryImpl;
use altscan::infrastructure::services::rate_limiting_service_impl::GovernorRateLimiter;
use altscan::utils::telemetry;
use altscan::workers::ScanWorker;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "altscan")]
#[command(about = "Audit a web page's images for alternative text coverage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a page and wait for the result
    Scan {
        /// Page URL
        url: String,

        /// Requesting user
        #[arg(short, long)]
        user: Uuid,

        /// Include per-image details in the output
        #[arg(long)]
        images: bool,
    },

    /// Retry a failed scan and wait for the result
    Retry {
        /// Scan id
        scan_id: Uuid,

        /// Include per-image details in the output
        #[arg(long)]
        images: bool,
    },

    /// Show a stored scan
    Show {
        /// Scan id
        scan_id: Uuid,

        /// Include per-image details in the output
        #[arg(long)]
        images: bool,

        /// Only images with (true) or without (false) an alt attribute
        #[arg(long)]
        has_alt: Option<bool>,
    },

    /// List a user's scans, newest first
    List {
        /// User id
        #[arg(short, long)]
        user: Uuid,

        /// Only scans with this status
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        #[arg(long, default_value_t = 50)]
        limit: u64,
    },

    /// Delete a scan and its image details
    Delete {
        /// Scan id
        scan_id: Uuid,
    },
}

/// 命令输出
#[derive(Serialize)]
struct ScanReport {
    #[serde(flatten)]
    scan: ScanResult,
    missing_alt_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality_breakdown: Option<QualityBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<ImageDetail>>,
}

/// 主函数
///
/// 初始化配置、日志、指标与数据库后执行子命令，结果以 JSON 输出
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(&settings.telemetry);
    if settings.telemetry.metrics_enabled {
        metrics::init_metrics(&settings.telemetry.metrics_addr);
    }

    // 3. Connect to database and apply migrations
    let db = connection::connect_and_migrate(&settings.database)
        .await
        .context("failed to prepare database")?;
    let db = Arc::new(db);
    info!("Database connection established");

    let use_case = build_use_case(&settings, db);
    // Validation DNS runs outside the fetch deadline
    let wait = Duration::from_secs(
        settings.scanner.dns_timeout_secs + settings.scanner.request_timeout_secs + 30,
    );

    match cli.command {
        Commands::Scan { url, user, images } => {
            let scan = use_case.request_scan(user, &url).await?;
            let scan = use_case.wait_for_terminal(scan.id, wait).await?;
            print_report(&use_case, scan, images).await?;
        }
        Commands::Retry { scan_id, images } => {
            let scan = use_case.retry_scan(scan_id).await?;
            let scan = use_case.wait_for_terminal(scan.id, wait).await?;
            print_report(&use_case, scan, images).await?;
        }
        Commands::Show {
            scan_id,
            images,
            has_alt,
        } => {
            let scan = use_case.get_scan(scan_id).await?;
            if images || has_alt.is_some() {
                let query = ImageQuery {
                    has_alt_text: has_alt,
                    limit: MAX_PAGE_SIZE,
                    ..ImageQuery::default()
                };
                let details = use_case.list_images(scan_id, &query).await?;
                print_json(&report(scan, Some(details)))?;
            } else {
                print_json(&report(scan, None))?;
            }
        }
        Commands::List {
            user,
            status,
            offset,
            limit,
        } => {
            let status = status
                .map(|s| {
                    s.parse::<ScanStatus>()
                        .map_err(|_| anyhow::anyhow!("unknown status '{}'", s))
                })
                .transpose()?;
            let query = ScanQuery {
                status,
                offset,
                limit,
                ..ScanQuery::default()
            };
            let scans = use_case.list_scans(user, &query).await?;
            let reports: Vec<_> = scans.into_iter().map(|s| report(s, None)).collect();
            print_json(&reports)?;
        }
        Commands::Delete { scan_id } => {
            use_case.delete_scan(scan_id).await?;
            print_json(&serde_json::json!({ "deleted": scan_id }))?;
        }
    }

    Ok(())
}

fn build_use_case(settings: &Settings, db: Arc<sea_orm::DatabaseConnection>) -> ScanUseCase {
    let repository = Arc::new(ScanResultRepositoryImpl::new(db));
    let validator = Arc::new(UrlValidator::new(&settings.scanner));
    let fetcher = Arc::new(ReqwestFetcher::new(&settings.scanner, validator.clone()));
    let worker = Arc::new(ScanWorker::new(
        &settings.scanner,
        repository.clone(),
        validator,
        fetcher,
    ));

    let limits = &settings.rate_limiting;
    let (scan_limiter, retry_limiter): (Arc<dyn RateLimiter>, Arc<dyn RateLimiter>) =
        if limits.enabled {
            let window = Duration::from_secs(limits.window_secs);
            (
                Arc::new(GovernorRateLimiter::new(limits.scan_requests_per_window, window)),
                Arc::new(GovernorRateLimiter::new(limits.retry_requests_per_window, window)),
            )
        } else {
            (Arc::new(NoopRateLimiter), Arc::new(NoopRateLimiter))
        };
    let daily_scan_limit = if limits.enabled {
        limits.daily_scan_limit
    } else {
        0
    };

    ScanUseCase::new(
        repository,
        worker,
        scan_limiter,
        retry_limiter,
        daily_scan_limit,
    )
}

async fn print_report(
    use_case: &ScanUseCase,
    scan: ScanResult,
    with_images: bool,
) -> anyhow::Result<()> {
    let images = if with_images {
        let query = ImageQuery {
            limit: MAX_PAGE_SIZE,
            ..ImageQuery::default()
        };
        Some(use_case.list_images(scan.id, &query).await?)
    } else {
        None
    };
    print_json(&report(scan, images))
}

fn report(scan: ScanResult, images: Option<Vec<ImageDetail>>) -> ScanReport {
    let quality_breakdown = images
        .as_ref()
        .map(|images| aggregate(images.iter()).quality_breakdown);
    ScanReport {
        missing_alt_percentage: scan.missing_alt_percentage(),
        scan,
        quality_breakdown,
        images,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
