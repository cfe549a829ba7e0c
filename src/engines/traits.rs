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

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::engines::validators::SafeUrl;

/// URL 校验错误
///
/// 错误文本会进入用户可见的 `error_message`，不得包含解析出的地址
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// URL 格式错误或缺少主机
    #[error("invalid URL ({0})")]
    InvalidUrl(String),
    /// 非 http/https 协议
    #[error("unsupported scheme '{0}', only http and https are allowed")]
    UnsupportedScheme(String),
    /// URL 过长
    #[error("URL exceeds the maximum length of {max} characters")]
    TooLong { max: usize },
    /// URL 中包含用户名或密码
    #[error("URLs with embedded credentials are not allowed")]
    CredentialsInUrl,
    /// 主机不在允许列表中
    #[error("domain '{0}' is not in the allowed list")]
    DomainNotAllowed(String),
    /// 重定向次数超出上限
    #[error("too many redirects (limit {max})")]
    TooManyRedirects { max: usize },
    /// DNS 解析超时
    #[error("DNS lookup for '{0}' timed out")]
    DnsTimeout(String),
    /// DNS 解析失败
    #[error("could not resolve host '{0}'")]
    DnsFailure(String),
}

/// 抓取错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 整体抓取时限耗尽
    #[error("request timed out")]
    Timeout,
    /// 最终响应不是 2xx，或重定向缺少有效的 Location
    #[error("upstream returned HTTP {0}")]
    HttpStatus(u16),
    /// 响应体超过上限
    #[error("response body exceeds {limit} bytes")]
    Oversize { limit: u64 },
    /// 不支持的内容类型
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),
    /// 网络层错误，只保留概括性描述
    #[error("network error ({0})")]
    Network(String),
}

impl FetchError {
    /// 指标标签使用的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Oversize { .. } => "oversize",
            FetchError::UnsupportedContentType(_) => "unsupported_content_type",
            FetchError::Network(_) => "network",
        }
    }
}

/// 扫描流水线错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// URL 校验失败
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    /// 目标地址被 SSRF 防护拦截
    #[error("destination '{host}' is blocked")]
    SsrfBlocked { host: String },
    /// 抓取失败
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    /// 响应完全不是 HTML
    #[error("parse error: {0}")]
    Parse(String),
}

impl ScanError {
    /// 错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Validation(_) => "validation_error",
            ScanError::SsrfBlocked { .. } => "ssrf_blocked",
            ScanError::Fetch(_) => "fetch_error",
            ScanError::Parse(_) => "parse_error",
        }
    }

    /// 写入 `error_message` 的安全描述，格式为 `<kind>: <description>`
    pub fn user_message(&self) -> String {
        let description = match self {
            ScanError::Validation(e) => e.to_string(),
            ScanError::SsrfBlocked { .. } => {
                "destination resolves to a private or reserved address".to_string()
            }
            ScanError::Fetch(e) => e.to_string(),
            ScanError::Parse(reason) => reason.clone(),
        };
        format!("{}: {}", self.kind(), description)
    }
}

/// 抓取到的页面
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 解码后的 HTML
    pub html: String,
    /// 跟随重定向后的最终 URL，用作相对地址的基准
    pub final_url: Url,
    /// 最终响应的状态码
    pub status_code: u16,
    /// 跟随的重定向次数
    pub redirects: usize,
}

/// 页面抓取特质
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 抓取已通过安全校验的 URL
    ///
    /// 实现必须对每个重定向目标重新校验，并遵守时间与字节上限
    async fn fetch(&self, target: SafeUrl) -> Result<FetchedPage, ScanError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
