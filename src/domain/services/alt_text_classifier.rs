// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::image_detail::{ImageDetail, RawImageRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// alt 文本分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltTextClassification {
    /// 是否存在 alt 属性（空字符串也算）
    pub has_alt_text: bool,
    /// 是否为装饰性图片，即 `alt=""`
    pub is_decorative: bool,
    /// alt 文本字符数，仅在非空时存在
    pub alt_text_length: Option<u32>,
}

/// 对 alt 属性进行分类
///
/// 纯函数，对任意输入都有结果
pub fn classify_alt(alt_text: Option<&str>) -> AltTextClassification {
    match alt_text {
        None => AltTextClassification {
            has_alt_text: false,
            is_decorative: false,
            alt_text_length: None,
        },
        Some("") => AltTextClassification {
            has_alt_text: true,
            is_decorative: true,
            alt_text_length: None,
        },
        Some(text) => AltTextClassification {
            has_alt_text: true,
            is_decorative: false,
            alt_text_length: Some(u32::try_from(text.chars().count()).unwrap_or(u32::MAX)),
        },
    }
}

/// 将图片引用转换为图片明细
pub fn classify(scan_result_id: Uuid, raw: RawImageRef) -> ImageDetail {
    let classification = classify_alt(raw.alt_text.as_deref());
    ImageDetail::new(scan_result_id, raw, classification)
}
