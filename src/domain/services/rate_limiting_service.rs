// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 限流器特质
///
/// 以字符串为键的非阻塞限流，键通常形如 `scan:<user_id>`
pub trait RateLimiter: Send + Sync {
    /// 尝试获取一个许可
    ///
    /// # 返回值
    ///
    /// 允许请求时返回 `true`，超出限额时返回 `false`
    fn try_acquire(&self, key: &str) -> bool;
}

/// 不做任何限制的限流器，用于关闭限流的部署与测试
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn try_acquire(&self, _key: &str) -> bool {
        true
    }
}
