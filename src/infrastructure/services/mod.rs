// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施服务模块
///
/// 提供基础设施层的服务实现，目前包括基于 governor 的进程内限流
pub mod rate_limiting_service_impl;
