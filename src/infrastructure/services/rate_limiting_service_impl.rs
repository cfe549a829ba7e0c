// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota};
use tracing::debug;

use crate::domain::services::rate_limiting_service::RateLimiter;

/// 超过该数量的键时清理已恢复满额的条目
const MAX_TRACKED_KEYS: usize = 10_000;

/// 限流服务实现
///
/// 基于 governor 的按键令牌桶：窗口内最多放行 `requests_per_window`
/// 次，令牌按 `window / requests_per_window` 的间隔匀速恢复
pub struct GovernorRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl GovernorRateLimiter {
    /// 创建新的限流器
    ///
    /// # 参数
    ///
    /// * `requests_per_window` - 每个窗口允许的请求数，为 0 时按 1 处理
    /// * `window` - 窗口长度
    pub fn new(requests_per_window: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(requests_per_window).unwrap_or(NonZeroU32::MIN);
        let period = window / burst.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: DefaultKeyedRateLimiter::keyed(quota),
        }
    }
}

impl RateLimiter for GovernorRateLimiter {
    fn try_acquire(&self, key: &str) -> bool {
        if self.limiter.len() > MAX_TRACKED_KEYS {
            self.limiter.retain_recent();
        }

        let allowed = self.limiter.check_key(&key.to_string()).is_ok();
        if !allowed {
            debug!(key, "Rate limit exceeded");
        }
        allowed
    }
}
