// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::image_detail::ImageDetail;
use crate::domain::models::scan_result::{ScanResult, ScanStatus};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 50;
/// 最大分页大小
pub const MAX_PAGE_SIZE: u64 = 200;

/// 图片明细查询参数
#[derive(Debug, Clone, Default)]
pub struct ImageQuery {
    /// 按是否存在 alt 过滤
    pub has_alt_text: Option<bool>,
    /// 按是否为装饰性图片过滤
    pub is_decorative: Option<bool>,
    pub offset: u64,
    /// 为 0 时使用默认分页大小，超出上限时截断
    pub limit: u64,
}

/// 扫描列表查询参数
#[derive(Debug, Clone, Default)]
pub struct ScanQuery {
    pub status: Option<ScanStatus>,
    pub created_after: Option<DateTime<FixedOffset>>,
    pub created_before: Option<DateTime<FixedOffset>>,
    pub offset: u64,
    pub limit: u64,
}

/// 将请求的分页大小规整到 `[1, MAX_PAGE_SIZE]`
pub fn page_size(limit: u64) -> u64 {
    match limit {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

/// 扫描结果仓库特质
///
/// 状态变更类写入都带有期望状态：仅当记录当前仍处于 `expected`
/// 状态时才生效，返回值表示写入是否生效。记录已被删除或被并发
/// 修改时返回 `false`，不视为错误。
#[async_trait]
pub trait ScanResultRepository: Send + Sync {
    /// 创建新的扫描记录
    async fn create(&self, scan: &ScanResult) -> Result<ScanResult, RepositoryError>;

    /// 根据ID查找扫描记录
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScanResult>, RepositoryError>;

    /// 条件写入扫描记录的状态与统计字段
    async fn save_scan_result(
        &self,
        scan: &ScanResult,
        expected: ScanStatus,
    ) -> Result<bool, RepositoryError>;

    /// 在同一事务中条件写入扫描记录，并用 `images` 替换其全部图片明细
    ///
    /// 条件不满足时整个事务回滚，已有明细保持不变
    async fn replace_image_details(
        &self,
        scan: &ScanResult,
        expected: ScanStatus,
        images: &[ImageDetail],
    ) -> Result<bool, RepositoryError>;

    /// 按文档顺序列出扫描的图片明细
    async fn list_images(
        &self,
        scan_id: Uuid,
        query: &ImageQuery,
    ) -> Result<Vec<ImageDetail>, RepositoryError>;

    /// 列出用户的扫描记录，按创建时间倒序
    async fn list_by_user(
        &self,
        user_id: Uuid,
        query: &ScanQuery,
    ) -> Result<Vec<ScanResult>, RepositoryError>;

    /// 统计用户在某时间点之后创建的扫描数量
    async fn count_created_since(
        &self,
        user_id: Uuid,
        since: DateTime<FixedOffset>,
    ) -> Result<u64, RepositoryError>;

    /// 删除扫描记录及其图片明细
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}
