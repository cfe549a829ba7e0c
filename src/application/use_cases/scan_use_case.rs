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

use crate::{
    domain::{
        models::{
            image_detail::ImageDetail,
            scan_result::{DomainError, ScanEvent, ScanResult, ScanStatus},
        },
        repositories::scan_result_repository::{
            ImageQuery, RepositoryError, ScanQuery, ScanResultRepository,
        },
        services::rate_limiting_service::RateLimiter,
    },
    workers::ScanWorker,
};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// 轮询扫描状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum UseCaseError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Scan not found")]
    NotFound,
    #[error(transparent)]
    InvalidTransition(#[from] DomainError),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Daily scan limit of {limit} reached")]
    QuotaExceeded { limit: u64 },
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 扫描用例
///
/// 扫描生命周期的入口：创建、重试与查询。流水线由 [`ScanWorker`] 异步执行。
pub struct ScanUseCase {
    repository: Arc<dyn ScanResultRepository>,
    worker: Arc<ScanWorker>,
    scan_limiter: Arc<dyn RateLimiter>,
    retry_limiter: Arc<dyn RateLimiter>,
    daily_scan_limit: u64,
    /// 按用户串行化配额检查与创建
    quota_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ScanUseCase {
    /// 创建扫描用例
    ///
    /// # 参数
    ///
    /// * `repository` - 扫描结果仓库
    /// * `worker` - 扫描工作器
    /// * `scan_limiter` - 创建扫描的限流器，键为 `scan:<user_id>`
    /// * `retry_limiter` - 重试扫描的限流器，键为 `retry:<user_id>`
    /// * `daily_scan_limit` - 每个用户 24 小时内的扫描上限，0 表示不限制
    pub fn new(
        repository: Arc<dyn ScanResultRepository>,
        worker: Arc<ScanWorker>,
        scan_limiter: Arc<dyn RateLimiter>,
        retry_limiter: Arc<dyn RateLimiter>,
        daily_scan_limit: u64,
    ) -> Self {
        Self {
            repository,
            worker,
            scan_limiter,
            retry_limiter,
            daily_scan_limit,
            quota_locks: DashMap::new(),
        }
    }

    /// 创建扫描并异步执行
    ///
    /// URL 只在此处做语法解析；协议、SSRF 等校验在流水线中进行，
    /// 失败时扫描以 `failed` 结束
    ///
    /// # 返回值
    ///
    /// 处于 `pending` 状态的扫描记录
    pub async fn request_scan(
        &self,
        user_id: Uuid,
        raw_url: &str,
    ) -> Result<ScanResult, UseCaseError> {
        let mut url =
            Url::parse(raw_url.trim()).map_err(|e| UseCaseError::InvalidUrl(e.to_string()))?;
        url.set_fragment(None);

        if !self.scan_limiter.try_acquire(&format!("scan:{}", user_id)) {
            warn!(%user_id, "Scan request rate limited");
            return Err(UseCaseError::RateLimited);
        }

        // Held until the new record is inserted
        let _quota_guard = if self.daily_scan_limit > 0 {
            let lock = self.quota_locks.entry(user_id).or_default().value().clone();
            let guard = lock.lock_owned().await;
            self.check_daily_quota(user_id).await?;
            Some(guard)
        } else {
            None
        };

        let scan = self
            .repository
            .create(&ScanResult::new(url.to_string(), user_id))
            .await?;
        info!(scan_id = %scan.id, url = %scan.url, "Scan requested");

        self.worker.spawn(scan.clone());
        Ok(scan)
    }

    /// 重试失败的扫描
    ///
    /// 清除错误信息与已有图片明细后重新执行完整流水线。
    /// 非 `failed` 状态的扫描会被拒绝且保持不变。
    pub async fn retry_scan(&self, scan_id: Uuid) -> Result<ScanResult, UseCaseError> {
        let scan = self.get_scan(scan_id).await?;
        let user_id = scan.user_id;

        // Rejected transitions do not spend the retry budget
        let pending = scan.retry()?;

        if !self
            .retry_limiter
            .try_acquire(&format!("retry:{}", user_id))
        {
            warn!(%scan_id, "Retry request rate limited");
            return Err(UseCaseError::RateLimited);
        }

        if !self
            .repository
            .replace_image_details(&pending, ScanStatus::Failed, &[])
            .await?
        {
            // Lost a race with a concurrent retry or delete
            let current = self.get_scan(scan_id).await?;
            return Err(DomainError::InvalidStateTransition {
                from: current.status,
                event: ScanEvent::Retry,
            }
            .into());
        }
        info!(%scan_id, "Scan retry requested");

        self.worker.spawn(pending.clone());
        Ok(pending)
    }

    async fn check_daily_quota(&self, user_id: Uuid) -> Result<(), UseCaseError> {
        let since = Utc::now() - ChronoDuration::hours(24);
        let recent = self
            .repository
            .count_created_since(user_id, since.into())
            .await?;
        if recent >= self.daily_scan_limit {
            warn!(%user_id, recent, "Daily scan limit reached");
            return Err(UseCaseError::QuotaExceeded {
                limit: self.daily_scan_limit,
            });
        }
        Ok(())
    }

    /// 获取扫描记录
    pub async fn get_scan(&self, scan_id: Uuid) -> Result<ScanResult, UseCaseError> {
        self.repository
            .find_by_id(scan_id)
            .await?
            .ok_or(UseCaseError::NotFound)
    }

    /// 按文档顺序列出扫描的图片明细
    pub async fn list_images(
        &self,
        scan_id: Uuid,
        query: &ImageQuery,
    ) -> Result<Vec<ImageDetail>, UseCaseError> {
        self.get_scan(scan_id).await?;
        Ok(self.repository.list_images(scan_id, query).await?)
    }

    /// 列出用户的扫描记录，最新的在前
    pub async fn list_scans(
        &self,
        user_id: Uuid,
        query: &ScanQuery,
    ) -> Result<Vec<ScanResult>, UseCaseError> {
        Ok(self.repository.list_by_user(user_id, query).await?)
    }

    /// 删除扫描记录及其图片明细
    ///
    /// 正在执行的流水线结束时会发现记录已不存在并丢弃结果
    pub async fn delete_scan(&self, scan_id: Uuid) -> Result<(), UseCaseError> {
        if self.repository.delete(scan_id).await? {
            info!(%scan_id, "Scan deleted");
            Ok(())
        } else {
            Err(UseCaseError::NotFound)
        }
    }

    /// 等待扫描进入终态
    ///
    /// 超时后返回当时的记录，调用方可根据状态判断是否完成
    pub async fn wait_for_terminal(
        &self,
        scan_id: Uuid,
        timeout: Duration,
    ) -> Result<ScanResult, UseCaseError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let scan = self.get_scan(scan_id).await?;
            if scan.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(scan);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
