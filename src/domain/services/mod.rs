// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 图片提取（image_extractor）：从 HTML 中收集图片引用
/// - alt 分类（alt_text_classifier）：判断 alt 是否存在、是否为装饰性
/// - 覆盖率聚合（coverage_aggregator）：汇总扫描级统计数据
/// - 限流（rate_limiting_service）：按键限流的抽象接口
pub mod alt_text_classifier;
pub mod coverage_aggregator;
pub mod image_extractor;
pub mod rate_limiting_service;
