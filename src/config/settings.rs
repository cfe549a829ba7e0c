// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、扫描器、速率限制和遥测等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 扫描器配置
    #[serde(default)]
    pub scanner: ScannerSettings,
    /// 速率限制配置
    #[serde(default)]
    pub rate_limiting: RateLimitingSettings,
    /// 遥测配置
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 扫描器配置设置
///
/// 控制 URL 安全校验、页面抓取与图片提取的资源上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    /// 单次抓取的总时限（秒），覆盖 DNS、连接与读取响应体
    pub request_timeout_secs: u64,
    /// DNS 解析超时（秒）
    pub dns_timeout_secs: u64,
    /// 响应体最大字节数
    pub max_body_bytes: u64,
    /// 最大重定向次数
    pub max_redirects: usize,
    /// URL 最大长度
    pub max_url_length: usize,
    /// 单次扫描最多记录的图片数量
    pub max_images_per_scan: usize,
    /// 同时运行的扫描流水线上限
    pub max_concurrent_scans: usize,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 禁止访问的域名（精确匹配或子域名匹配）
    pub blocked_domains: Vec<String>,
    /// 允许访问的域名，为空表示不限制
    pub allowed_domains: Vec<String>,
    /// 是否允许访问私有网络地址，仅用于本地开发
    pub allow_private_networks: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            dns_timeout_secs: 5,
            max_body_bytes: 5 * 1024 * 1024,
            max_redirects: 5,
            max_url_length: 2048,
            max_images_per_scan: 1000,
            max_concurrent_scans: 5,
            user_agent: "Mozilla/5.0 (compatible; altscan/1.0; +https://altscan.dev)".to_string(),
            blocked_domains: vec![
                "localhost".to_string(),
                "localhost.localdomain".to_string(),
                "metadata.google.internal".to_string(),
                "169.254.169.254".to_string(),
            ],
            allowed_domains: Vec::new(),
            allow_private_networks: false,
        }
    }
}

impl ScannerSettings {
    /// 抓取总时限
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// DNS 解析时限
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }
}

/// 速率限制配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitingSettings {
    /// 是否启用速率限制
    pub enabled: bool,
    /// 每个窗口内允许的扫描请求数（按用户）
    pub scan_requests_per_window: u32,
    /// 每个窗口内允许的重试请求数（按用户）
    pub retry_requests_per_window: u32,
    /// 窗口长度（秒）
    pub window_secs: u64,
    /// 每个用户 24 小时内的扫描上限，0 表示不限制
    pub daily_scan_limit: u64,
}

impl Default for RateLimitingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_requests_per_window: 10,
            retry_requests_per_window: 5,
            window_secs: 60,
            daily_scan_limit: 100,
        }
    }
}

/// 遥测配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// 是否输出 JSON 格式日志
    pub json: bool,
    /// 是否启用 Prometheus 指标导出
    pub metrics_enabled: bool,
    /// 指标导出监听地址
    pub metrics_addr: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            json: false,
            metrics_enabled: false,
            metrics_addr: "0.0.0.0:9000".to_string(),
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}` 与
    /// `ALTSCAN__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Default DB pool settings
            .set_default("database.url", "sqlite://altscan.db?mode=rwc")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("ALTSCAN")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scanner.blocked_domains")
                    .with_list_parse_key("scanner.allowed_domains")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
