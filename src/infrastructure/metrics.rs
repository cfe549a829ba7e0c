// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::domain::models::scan_result::ScanStatus;

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册扫描相关指标。地址无效或端口被占用时
/// 只记录警告，不影响扫描功能。
pub fn init_metrics(addr: &str) {
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}", e);
        return;
    }

    describe_counter!("altscan_scans_total", "Scans that reached a terminal status");
    describe_counter!(
        "altscan_fetch_errors_total",
        "Scan pipeline failures grouped by error kind"
    );
    describe_histogram!(
        "altscan_scan_duration_ms",
        "Wall-clock duration of the scan pipeline in milliseconds"
    );
    describe_counter!(
        "altscan_images_audited_total",
        "Images classified by completed scans"
    );

    info!("Metrics exporter listening on {}", addr);
}

/// 记录扫描结束
pub fn record_scan_finished(status: ScanStatus, duration_ms: u64) {
    counter!("altscan_scans_total", "status" => status.as_str()).increment(1);
    histogram!("altscan_scan_duration_ms").record(duration_ms as f64);
}

/// 记录流水线失败的类别
pub fn record_scan_error(kind: &'static str) {
    counter!("altscan_fetch_errors_total", "kind" => kind).increment(1);
}

/// 记录完成扫描中审计的图片数
pub fn record_images_audited(count: u32) {
    counter!("altscan_images_audited_total").increment(u64::from(count));
}
