// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含扫描生命周期的用例实现，协调领域服务、仓库与工作器
pub mod use_cases;
