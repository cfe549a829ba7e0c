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

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::ScannerSettings;
use crate::domain::models::image_detail::ImageDetail;
use crate::domain::models::scan_result::{DomainError, ScanResult, ScanStatus};
use crate::domain::repositories::scan_result_repository::{RepositoryError, ScanResultRepository};
use crate::domain::services::alt_text_classifier::classify;
use crate::domain::services::coverage_aggregator::{aggregate, CoverageSummary};
use crate::domain::services::image_extractor::ImageExtractor;
use crate::engines::traits::{PageFetcher, ScanError};
use crate::engines::validators::UrlValidator;
use crate::infrastructure::metrics;

/// 工作器错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// 扫描工作器
///
/// 执行单次扫描流水线：校验 → 抓取 → 提取 → 分类 → 聚合 → 持久化。
/// 同一扫描 ID 在本进程内最多只有一个流水线在执行，跨进程的互斥由
/// 仓库的条件写入保证。
pub struct ScanWorker {
    repository: Arc<dyn ScanResultRepository>,
    validator: Arc<UrlValidator>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: ImageExtractor,
    in_flight: DashMap<Uuid, ()>,
    permits: Semaphore,
}

/// 进程内执行标记，离开作用域时移除
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<Uuid, ()>,
    scan_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.scan_id);
    }
}

impl ScanWorker {
    /// 创建新的扫描工作器
    ///
    /// # 参数
    ///
    /// * `settings` - 扫描器配置，提供并发上限与图片数量上限
    /// * `repository` - 扫描结果仓库
    /// * `validator` - URL 安全校验器
    /// * `fetcher` - 页面抓取引擎
    pub fn new(
        settings: &ScannerSettings,
        repository: Arc<dyn ScanResultRepository>,
        validator: Arc<UrlValidator>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            repository,
            validator,
            fetcher,
            extractor: ImageExtractor::new(settings.max_images_per_scan),
            in_flight: DashMap::new(),
            permits: Semaphore::new(settings.max_concurrent_scans.max(1)),
        }
    }

    /// 在后台任务中执行扫描
    ///
    /// 任务结果为扫描的终态；未能执行（已在执行中、已被认领或已删除）时为 `None`
    pub fn spawn(self: &Arc<Self>, scan: ScanResult) -> JoinHandle<Option<ScanResult>> {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            let scan_id = scan.id;
            match worker.run(scan).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%scan_id, "Scan pipeline could not record its outcome: {}", e);
                    None
                }
            }
        })
    }

    /// 是否有流水线正在执行该扫描
    pub fn is_in_flight(&self, scan_id: Uuid) -> bool {
        self.in_flight.contains_key(&scan_id)
    }

    /// 执行扫描流水线
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(ScanResult))` - 流水线执行完毕后的终态
    /// * `Ok(None)` - 扫描不处于待执行状态，或已被其他执行者认领
    /// * `Err(WorkerError)` - 持久化失败
    #[instrument(skip(self, scan), fields(scan_id = %scan.id, url = %scan.url))]
    pub async fn run(&self, scan: ScanResult) -> Result<Option<ScanResult>, WorkerError> {
        if self.in_flight.insert(scan.id, ()).is_some() {
            debug!("Scan already in flight, skipping");
            return Ok(None);
        }
        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            scan_id: scan.id,
        };

        let Ok(_permit) = self.permits.acquire().await else {
            warn!("Scan worker is shutting down");
            return Ok(None);
        };

        let running = match scan.start() {
            Ok(running) => running,
            Err(e) => {
                debug!("Scan is not pending: {}", e);
                return Ok(None);
            }
        };
        if !self
            .repository
            .save_scan_result(&running, ScanStatus::Pending)
            .await?
        {
            debug!("Scan was claimed elsewhere or deleted before it started");
            return Ok(None);
        }
        info!("Scan started");

        let started = Instant::now();
        let outcome = self.execute(&running).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        // The row stays `running` until the terminal write below, so a retry
        // cannot slip in between releasing the marker and persisting.
        drop(guard);

        let (scan, persisted) = match outcome {
            Ok((summary, images)) => {
                let completed = running.complete(&summary, duration_ms)?;
                let persisted = self
                    .repository
                    .replace_image_details(&completed, ScanStatus::Running, &images)
                    .await?;
                if persisted {
                    metrics::record_images_audited(summary.total_images);
                    info!(
                        total_images = summary.total_images,
                        coverage = summary.coverage_percentage,
                        duration_ms,
                        "Scan completed"
                    );
                }
                (completed, persisted)
            }
            Err(e) => {
                warn!(kind = e.kind(), duration_ms, "Scan failed: {}", e);
                metrics::record_scan_error(e.kind());
                let failed = running.fail(e.user_message(), duration_ms)?;
                let persisted = self
                    .repository
                    .save_scan_result(&failed, ScanStatus::Running)
                    .await?;
                (failed, persisted)
            }
        };

        if !persisted {
            // Deleted while running; the outcome is dropped
            info!("Scan no longer exists, outcome discarded");
            return Ok(None);
        }
        metrics::record_scan_finished(scan.status, duration_ms);
        Ok(Some(scan))
    }

    async fn execute(
        &self,
        scan: &ScanResult,
    ) -> Result<(CoverageSummary, Vec<ImageDetail>), ScanError> {
        let target = self.validator.validate(&scan.url).await?;
        let page = self.fetcher.fetch(target).await?;
        debug!(
            engine = self.fetcher.name(),
            status = page.status_code,
            redirects = page.redirects,
            bytes = page.html.len(),
            "Page fetched"
        );

        let extractor = self.extractor.clone();
        let scan_id = scan.id;
        let images = tokio::task::spawn_blocking(move || {
            extractor
                .extract(&page.html, &page.final_url)
                .into_iter()
                .map(|raw| classify(scan_id, raw))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| {
            error!("Image extraction task aborted: {}", e);
            ScanError::Parse("image extraction was aborted".to_string())
        })?;

        let summary = aggregate(&images);
        Ok((summary, images))
    }
}

#[cfg(test)]
#[path = "scan_worker_test.rs"]
mod tests;
