// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供扫描流水线的后台执行与并发控制
pub mod scan_worker;

pub use scan_worker::ScanWorker;
