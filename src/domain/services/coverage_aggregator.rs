// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::image_detail::{AltTextQuality, ImageDetail};
use serde::{Deserialize, Serialize};

/// 各质量等级的图片数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityBreakdown {
    pub missing: u32,
    pub decorative: u32,
    pub poor: u32,
    pub too_long: u32,
    pub good: u32,
}

impl QualityBreakdown {
    fn record(&mut self, quality: AltTextQuality) {
        match quality {
            AltTextQuality::Missing => self.missing += 1,
            AltTextQuality::Decorative => self.decorative += 1,
            AltTextQuality::Poor => self.poor += 1,
            AltTextQuality::TooLong => self.too_long += 1,
            AltTextQuality::Good => self.good += 1,
        }
    }
}

/// 覆盖率汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_images: u32,
    pub images_with_alt: u32,
    pub images_missing_alt: u32,
    pub decorative_images: u32,
    /// `images_with_alt / total_images * 100`，保留一位小数，无图片时为 0.0
    pub coverage_percentage: f64,
    pub quality_breakdown: QualityBreakdown,
}

/// 计算百分比，四舍五入（半数向上）到一位小数
///
/// 使用整数运算避免浮点误差；`total == 0` 时返回 0.0
pub fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let part = u64::from(part);
    let total = u64::from(total);
    // tenths of a percent, rounded half-up: floor((part * 1000 + total / 2) / total)
    let tenths = (part * 2000 + total) / (2 * total);
    tenths as f64 / 10.0
}

/// 聚合图片明细
///
/// 对空输入同样成立
pub fn aggregate<'a, I>(images: I) -> CoverageSummary
where
    I: IntoIterator<Item = &'a ImageDetail>,
{
    let mut total: u32 = 0;
    let mut with_alt: u32 = 0;
    let mut decorative: u32 = 0;
    let mut breakdown = QualityBreakdown::default();

    for image in images {
        total += 1;
        if image.has_alt_text {
            with_alt += 1;
        }
        if image.is_decorative {
            decorative += 1;
        }
        breakdown.record(image.quality());
    }

    CoverageSummary {
        total_images: total,
        images_with_alt: with_alt,
        images_missing_alt: total - with_alt,
        decorative_images: decorative,
        coverage_percentage: percentage(with_alt, total),
        quality_breakdown: breakdown,
    }
}
