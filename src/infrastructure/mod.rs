// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，依赖于领域层的抽象接口。
///
/// 包含的子模块：
/// - 数据库（database）：连接池与 SeaORM 实体映射
/// - 指标（metrics）：Prometheus 导出与扫描指标记录
/// - 仓库实现（repositories）：扫描结果仓库的 SeaORM 实现
/// - 服务（services）：限流等基础设施服务
pub mod database;
pub mod metrics;
pub mod repositories;
pub mod services;
