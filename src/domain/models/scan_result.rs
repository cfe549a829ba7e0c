// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::services::coverage_aggregator::CoverageSummary;

/// 扫描结果实体
///
/// 每个用户对每个 URL 的一次扫描请求对应一条记录。记录只由扫描生命周期
/// 控制器修改，状态转换遵循 [`ScanStatus::on`] 中的转换表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// 扫描唯一标识符
    pub id: Uuid,
    /// 规范化后的绝对 URL，创建后不可变
    pub url: String,
    /// 发起扫描的用户
    pub user_id: Uuid,
    /// 当前状态
    pub status: ScanStatus,
    /// 图片总数
    pub total_images: u32,
    /// 带有 alt 属性的图片数（含装饰性图片）
    pub images_with_alt: u32,
    /// 缺少 alt 属性的图片数
    pub images_missing_alt: u32,
    /// alt 覆盖率，保留一位小数
    pub alt_text_coverage_percentage: f64,
    /// 失败原因，仅在 `Failed` 状态下存在
    pub error_message: Option<String>,
    /// 流水线耗时（毫秒）
    pub scan_duration_ms: Option<u64>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 最后一次状态转换的时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 扫描状态
///
/// Pending → Running → Completed / Failed，Failed 可经显式重试回到 Pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// 已创建，等待执行
    #[default]
    Pending,
    /// 流水线执行中
    Running,
    /// 执行成功
    Completed,
    /// 执行失败
    Failed,
}

/// 驱动状态转换的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEvent {
    /// 开始执行流水线
    Start,
    /// 流水线成功结束
    Complete,
    /// 流水线失败
    Fail,
    /// 外部显式重试
    Retry,
}

impl ScanStatus {
    /// 状态转换表
    ///
    /// 不在表中的 (状态, 事件) 组合一律拒绝
    pub fn on(self, event: ScanEvent) -> Result<ScanStatus, DomainError> {
        match (self, event) {
            (ScanStatus::Pending, ScanEvent::Start) => Ok(ScanStatus::Running),
            (ScanStatus::Running, ScanEvent::Complete) => Ok(ScanStatus::Completed),
            (ScanStatus::Running, ScanEvent::Fail) => Ok(ScanStatus::Failed),
            (ScanStatus::Failed, ScanEvent::Retry) => Ok(ScanStatus::Pending),
            (from, event) => Err(DomainError::InvalidStateTransition { from, event }),
        }
    }

    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanEvent::Start => write!(f, "start"),
            ScanEvent::Complete => write!(f, "complete"),
            ScanEvent::Fail => write!(f, "fail"),
            ScanEvent::Retry => write!(f, "retry"),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition: cannot {event} a {from} scan")]
    InvalidStateTransition { from: ScanStatus, event: ScanEvent },
}

impl ScanResult {
    /// 创建一个处于 Pending 状态的扫描
    pub fn new(url: String, user_id: Uuid) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            url,
            user_id,
            status: ScanStatus::Pending,
            total_images: 0,
            images_with_alt: 0,
            images_missing_alt: 0,
            alt_text_coverage_percentage: 0.0,
            error_message: None,
            scan_duration_ms: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, event: ScanEvent) -> Result<(), DomainError> {
        self.status = self.status.on(event)?;
        self.updated_at = Utc::now().into();
        Ok(())
    }

    /// 启动扫描
    ///
    /// 将状态从 Pending 变更为 Running
    pub fn start(mut self) -> Result<Self, DomainError> {
        self.apply(ScanEvent::Start)?;
        Ok(self)
    }

    /// 完成扫描
    ///
    /// 将状态从 Running 变更为 Completed，并写入聚合结果
    pub fn complete(
        mut self,
        summary: &CoverageSummary,
        duration_ms: u64,
    ) -> Result<Self, DomainError> {
        self.apply(ScanEvent::Complete)?;
        self.total_images = summary.total_images;
        self.images_with_alt = summary.images_with_alt;
        self.images_missing_alt = summary.images_missing_alt;
        self.alt_text_coverage_percentage = summary.coverage_percentage;
        self.error_message = None;
        self.scan_duration_ms = Some(duration_ms);
        Ok(self)
    }

    /// 标记扫描失败
    ///
    /// 将状态从 Running 变更为 Failed，计数清零
    pub fn fail(mut self, error_message: String, duration_ms: u64) -> Result<Self, DomainError> {
        self.apply(ScanEvent::Fail)?;
        self.total_images = 0;
        self.images_with_alt = 0;
        self.images_missing_alt = 0;
        self.alt_text_coverage_percentage = 0.0;
        self.error_message = Some(error_message);
        self.scan_duration_ms = Some(duration_ms);
        Ok(self)
    }

    /// 重试扫描
    ///
    /// 将状态从 Failed 变更为 Pending，清除错误信息与上一次的耗时
    pub fn retry(mut self) -> Result<Self, DomainError> {
        self.apply(ScanEvent::Retry)?;
        self.error_message = None;
        self.scan_duration_ms = None;
        Ok(self)
    }

    /// 缺失 alt 的图片占比，保留一位小数
    pub fn missing_alt_percentage(&self) -> f64 {
        crate::domain::services::coverage_aggregator::percentage(
            self.images_missing_alt,
            self.total_images,
        )
    }
}
