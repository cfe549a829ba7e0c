// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::services::alt_text_classifier::AltTextClassification;

/// 从页面标记中提取出的图片引用
///
/// 只包含标记中声明的信息，不抓取图片本身
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImageRef {
    /// 在文档中的出现顺序，从 0 开始
    pub position: u32,
    /// 解析为绝对地址的图片 URL
    pub image_url: String,
    /// `alt` 属性原始值，`None` 表示属性不存在
    pub alt_text: Option<String>,
    /// 标记中声明的宽度
    pub width: Option<u32>,
    /// 标记中声明的高度
    pub height: Option<u32>,
}

/// 图片明细
///
/// 归属于一次已完成的扫描，随扫描结果一并删除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetail {
    pub id: Uuid,
    pub scan_result_id: Uuid,
    pub position: u32,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub has_alt_text: bool,
    pub is_decorative: bool,
    pub alt_text_length: Option<u32>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub created_at: DateTime<FixedOffset>,
}

impl ImageDetail {
    /// 由图片引用与分类结果构建明细
    pub fn new(
        scan_result_id: Uuid,
        raw: RawImageRef,
        classification: AltTextClassification,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            scan_result_id,
            position: raw.position,
            image_url: raw.image_url,
            alt_text: raw.alt_text,
            has_alt_text: classification.has_alt_text,
            is_decorative: classification.is_decorative,
            alt_text_length: classification.alt_text_length,
            image_width: raw.width,
            image_height: raw.height,
            created_at: Utc::now().into(),
        }
    }

    /// 质量等级，由已存储字段即时推导
    pub fn quality(&self) -> AltTextQuality {
        AltTextQuality::derive(self.has_alt_text, self.is_decorative, self.alt_text_length)
    }
}

/// alt 文本质量等级
///
/// 仅供展示与分析使用，不落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltTextQuality {
    /// 没有 alt 属性
    Missing,
    /// `alt=""`
    Decorative,
    /// 少于 5 个字符
    Poor,
    /// 超过 125 个字符
    TooLong,
    Good,
}

/// 低于该长度视为质量差
pub const POOR_ALT_TEXT_THRESHOLD: u32 = 5;
/// 超过该长度视为过长
pub const MAX_GOOD_ALT_TEXT_LENGTH: u32 = 125;

impl AltTextQuality {
    /// 根据分类字段推导质量等级
    pub fn derive(has_alt_text: bool, is_decorative: bool, alt_text_length: Option<u32>) -> Self {
        if !has_alt_text {
            return AltTextQuality::Missing;
        }
        if is_decorative {
            return AltTextQuality::Decorative;
        }
        match alt_text_length.unwrap_or(0) {
            len if len < POOR_ALT_TEXT_THRESHOLD => AltTextQuality::Poor,
            len if len > MAX_GOOD_ALT_TEXT_LENGTH => AltTextQuality::TooLong,
            _ => AltTextQuality::Good,
        }
    }
}

impl fmt::Display for AltTextQuality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AltTextQuality::Missing => write!(f, "missing"),
            AltTextQuality::Decorative => write!(f, "decorative"),
            AltTextQuality::Poor => write!(f, "poor"),
            AltTextQuality::TooLong => write!(f, "too_long"),
            AltTextQuality::Good => write!(f, "good"),
        }
    }
}
