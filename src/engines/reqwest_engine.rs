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

use crate::config::settings::ScannerSettings;
use crate::engines::traits::{FetchError, FetchedPage, PageFetcher, ScanError, ValidationError};
use crate::engines::validators::{SafeUrl, UrlValidator};
use crate::utils::text_encoding;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 可接受的页面类型
const HTML_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// 抓取引擎
///
/// 基于reqwest实现的页面抓取器。重定向由本引擎逐跳处理：每一跳都重新
/// 经过 [`UrlValidator`]，并且只连接校验时解析出的地址。
pub struct ReqwestFetcher {
    validator: Arc<UrlValidator>,
    user_agent: String,
    timeout: Duration,
    max_body_bytes: u64,
    max_redirects: usize,
}

impl ReqwestFetcher {
    /// 创建新的抓取引擎
    ///
    /// # 参数
    ///
    /// * `settings` - 扫描器配置，提供时限、字节上限与重定向上限
    /// * `validator` - 用于校验重定向目标的 URL 校验器
    pub fn new(settings: &ScannerSettings, validator: Arc<UrlValidator>) -> Self {
        Self {
            validator,
            user_agent: settings.user_agent.clone(),
            timeout: settings.request_timeout(),
            max_body_bytes: settings.max_body_bytes,
            max_redirects: settings.max_redirects,
        }
    }

    async fn fetch_with_redirects(&self, target: SafeUrl) -> Result<FetchedPage, ScanError> {
        let mut current = target;
        let mut redirects = 0usize;

        loop {
            let client = self.client_for(&current)?;
            let response = client
                .get(current.url().clone())
                .send()
                .await
                .map_err(classify_reqwest_error)?;
            let status = response.status();

            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|location| current.url().join(location.trim()).ok())
                    .ok_or(FetchError::HttpStatus(status.as_u16()))?;

                if redirects >= self.max_redirects {
                    return Err(ValidationError::TooManyRedirects {
                        max: self.max_redirects,
                    }
                    .into());
                }
                redirects += 1;
                debug!(status = status.as_u16(), hop = redirects, "Following redirect");

                // Redirect targets are never trusted transitively
                current = self.validator.validate_url(next).await?;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()).into());
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .filter(|value| !value.trim().is_empty());

            if let Some(content_type) = &content_type {
                let mime = mime_type(content_type);
                if !HTML_CONTENT_TYPES.contains(&mime.as_str()) {
                    return Err(FetchError::UnsupportedContentType(mime).into());
                }
            }

            let body = read_limited(response, self.max_body_bytes).await?;
            let html = text_encoding::decode_body(&body, content_type.as_deref());

            if content_type.is_none() && !looks_like_markup(&html) {
                return Err(ScanError::Parse(
                    "response has no content type and is not an HTML document".to_string(),
                ));
            }

            return Ok(FetchedPage {
                html,
                final_url: current.into_url(),
                status_code: status.as_u16(),
                redirects,
            });
        }
    }

    /// 为单跳请求构建客户端，主机名固定解析到校验过的地址
    fn client_for(&self, target: &SafeUrl) -> Result<Client, ScanError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.1"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .default_headers(headers)
            .redirect(Policy::none())
            .no_proxy()
            .connect_timeout(self.timeout);

        if let Some(domain) = target.domain() {
            builder = builder.resolve_to_addrs(domain, target.addrs());
        }

        builder.build().map_err(|e| {
            warn!(error = %e, "Failed to build HTTP client");
            ScanError::Fetch(FetchError::Network("client initialization failed".to_string()))
        })
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    /// 执行页面抓取
    ///
    /// 总时限覆盖所有重定向跳转、连接与响应体读取
    async fn fetch(&self, target: SafeUrl) -> Result<FetchedPage, ScanError> {
        match tokio::time::timeout(self.timeout, self.fetch_with_redirects(target)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout.into()),
        }
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

/// 读取响应体，超过上限立即中止
async fn read_limited(mut response: Response, limit: u64) -> Result<Vec<u8>, ScanError> {
    if response.content_length().is_some_and(|len| len > limit) {
        return Err(FetchError::Oversize { limit }.into());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(classify_reqwest_error)? {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(FetchError::Oversize { limit }.into());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// 去掉参数后的小写 MIME 类型
fn mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn looks_like_markup(body: &str) -> bool {
    body.trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with('<')
}

/// 将 reqwest 错误映射为不含内部细节的抓取错误
fn classify_reqwest_error(error: reqwest::Error) -> FetchError {
    debug!(error = ?error, "HTTP request failed");
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() {
        FetchError::Network("connection failed".to_string())
    } else if error.is_body() || error.is_decode() {
        FetchError::Network("response body could not be read".to_string())
    } else {
        FetchError::Network("request failed".to_string())
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
