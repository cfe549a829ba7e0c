// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;
use tracing::{debug, warn};
use url::{Host, Url};

use crate::config::settings::ScannerSettings;
use crate::engines::traits::{ScanError, ValidationError};
use crate::utils::url_utils::host_matches_domain;

/// 已通过安全校验的 URL
///
/// 携带校验时解析出的地址，抓取时直接连接这些地址，
/// 不再进行第二次 DNS 查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeUrl {
    url: Url,
    addrs: Vec<SocketAddr>,
}

impl SafeUrl {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// 域名主机，IP 字面量返回 `None`
    pub fn domain(&self) -> Option<&str> {
        self.url.domain()
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

/// 主机名解析特质
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>>;
}

/// 基于系统解析器的实现
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
        Ok(lookup_host((host, port)).await?.collect())
    }
}

/// URL 安全校验器 (防止 SSRF)
#[derive(Clone)]
pub struct UrlValidator {
    resolver: Arc<dyn HostResolver>,
    max_url_length: usize,
    dns_timeout: Duration,
    blocked_domains: Vec<String>,
    allowed_domains: Vec<String>,
    allow_private_networks: bool,
}

impl UrlValidator {
    /// 使用系统 DNS 创建校验器
    pub fn new(settings: &ScannerSettings) -> Self {
        Self::with_resolver(settings, Arc::new(SystemResolver))
    }

    /// 使用指定的解析器创建校验器
    pub fn with_resolver(settings: &ScannerSettings, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            resolver,
            max_url_length: settings.max_url_length,
            dns_timeout: settings.dns_timeout(),
            blocked_domains: settings.blocked_domains.clone(),
            allowed_domains: settings.allowed_domains.clone(),
            allow_private_networks: settings.allow_private_networks,
        }
    }

    /// 校验原始 URL 字符串
    ///
    /// # 返回值
    ///
    /// * `Ok(SafeUrl)` - 去掉片段后的 URL 与其解析地址
    /// * `Err(ScanError::Validation)` - 格式、协议、长度或 DNS 问题
    /// * `Err(ScanError::SsrfBlocked)` - 目标为非公网地址或被禁止的域名
    pub async fn validate(&self, raw_url: &str) -> Result<SafeUrl, ScanError> {
        let raw_url = raw_url.trim();
        if raw_url.len() > self.max_url_length {
            return Err(ValidationError::TooLong {
                max: self.max_url_length,
            }
            .into());
        }
        let url = Url::parse(raw_url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
        self.validate_url(url).await
    }

    /// 校验已解析的 URL，重定向目标也经由此处
    pub async fn validate_url(&self, mut url: Url) -> Result<SafeUrl, ScanError> {
        if url.as_str().len() > self.max_url_length {
            return Err(ValidationError::TooLong {
                max: self.max_url_length,
            }
            .into());
        }

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ValidationError::UnsupportedScheme(other.to_string()).into()),
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(ValidationError::CredentialsInUrl.into());
        }

        url.set_fragment(None);

        let host = url
            .host()
            .map(|host| host.to_owned())
            .ok_or_else(|| ValidationError::InvalidUrl("missing host".to_string()))?;
        let host_name = url.host_str().unwrap_or_default().to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ValidationError::InvalidUrl("missing port".to_string()))?;

        if self
            .blocked_domains
            .iter()
            .any(|domain| host_matches_domain(&host_name, domain))
        {
            warn!(host = %host_name, "SSRF protection: host is on the blocked domain list");
            return Err(ScanError::SsrfBlocked { host: host_name });
        }

        if !self.allowed_domains.is_empty()
            && !self
                .allowed_domains
                .iter()
                .any(|domain| host_matches_domain(&host_name, domain))
        {
            return Err(ValidationError::DomainNotAllowed(host_name).into());
        }

        let addrs = match host {
            Host::Ipv4(ip) => vec![SocketAddr::new(IpAddr::V4(ip), port)],
            Host::Ipv6(ip) => vec![SocketAddr::new(IpAddr::V6(ip), port)],
            Host::Domain(domain) => self.resolve(&domain, port).await?,
        };

        if !self.allow_private_networks {
            if let Some(blocked) = addrs.iter().find(|addr| !is_public_ip(addr.ip())) {
                warn!(
                    host = %host_name,
                    ip = %blocked.ip(),
                    "SSRF protection: host resolves to a non-public address"
                );
                return Err(ScanError::SsrfBlocked { host: host_name });
            }
        }

        debug!(host = %host_name, addrs = addrs.len(), "URL passed safety validation");
        Ok(SafeUrl { url, addrs })
    }

    async fn resolve(&self, domain: &str, port: u16) -> Result<Vec<SocketAddr>, ScanError> {
        let lookup = tokio::time::timeout(self.dns_timeout, self.resolver.resolve(domain, port));
        let addrs = match lookup.await {
            Err(_) => return Err(ValidationError::DnsTimeout(domain.to_string()).into()),
            Ok(Err(e)) => {
                debug!(host = domain, error = %e, "DNS lookup failed");
                return Err(ValidationError::DnsFailure(domain.to_string()).into());
            }
            Ok(Ok(addrs)) => addrs,
        };
        if addrs.is_empty() {
            return Err(ValidationError::DnsFailure(domain.to_string()).into());
        }
        Ok(addrs)
    }
}

/// 判断 IP 是否为可公开路由的地址
///
/// 环回、链路本地、私有（RFC 1918 / RFC 4193）、组播、保留与未指定地址均返回 `false`
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_public_ipv4(ipv4),
        IpAddr::V6(ipv6) => match ipv6.to_ipv4_mapped() {
            Some(mapped) => is_public_ipv4(mapped),
            None => is_public_ipv6(ipv6),
        },
    }
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    let blocked = a == 0 // 0.0.0.0/8
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_documentation()
        || ip.is_broadcast()
        || a >= 240 // 240.0.0.0/4
        || (a == 100 && (b & 0xc0) == 64) // 100.64.0.0/10
        || (a == 192 && b == 0 && c == 0) // 192.0.0.0/24
        || (a == 198 && (b & 0xfe) == 18); // 198.18.0.0/15
    !blocked
}

fn is_public_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let blocked = ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        || (first & 0xfe00) == 0xfc00 // fc00::/7
        || (first & 0xffc0) == 0xfe80 // fe80::/10
        || (first & 0xffc0) == 0xfec0 // fec0::/10
        || (first == 0x2001 && ip.segments()[1] == 0x0db8) // 2001:db8::/32
        || ip.segments()[..6].iter().all(|s| *s == 0); // ::a.b.c.d
    !blocked
}
