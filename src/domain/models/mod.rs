// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 扫描结果（scan_result）：一次扫描请求及其生命周期状态
/// - 图片明细（image_detail）：扫描发现的单张图片及其 alt 分类
pub mod image_detail;
pub mod scan_result;
