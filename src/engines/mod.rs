// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 抓取引擎模块
///
/// - 校验器（validators）：URL 安全校验与 SSRF 防护
/// - 特质（traits）：抓取接口与错误分类
/// - reqwest 引擎（reqwest_engine）：带重定向校验与资源上限的页面抓取
pub mod reqwest_engine;
pub mod traits;
pub mod validators;
