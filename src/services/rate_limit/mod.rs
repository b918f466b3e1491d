//! # Rate Limit Engine
//!
//! 세 가지 교체 가능한 알고리즘을 하나의 [`RateLimit`] trait 뒤에 둡니다.
//!
//! | 알고리즘 | 저장 형태 | 스크립트 |
//! |----------|-----------|----------|
//! | [`FixedWindowLimiter`] | 정수 카운터 | `FixedWindowHit` / `FixedWindowPeek` |
//! | [`SlidingWindowLimiter`] | 이벤트 타임스탬프 ZSET | `SlidingWindowHit` / `SlidingWindowPeek` |
//! | [`TokenBucketLimiter`] | HASH `{tokens, ts}` | `TokenBucketTake` / `TokenBucketPeek` |
//!
//! 모든 소비(take)는 저장소에서 단일 원자 스크립트로 실행됩니다. 애플리케이션 코드에서
//! 값을 읽은 뒤 다시 쓰는 경로는 없습니다.
//!
//! 한도 초과는 에러가 아니라 `allowed: false`인 [`RateLimitResult`]입니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! let policy = RateLimitPolicy::FixedWindow { prefix: "rl:login".into(), limit: 5, window: Ttl::from_secs(60) };
//! let limiter = build_limiter(&policy, store.clone(), clock.clone(), keys.clone())?;
//!
//! let result = limiter.take("198.51.100.7").await?;
//! if !result.allowed {
//!     // Retry-After: result.retry_in_ms
//! }
//! ```

pub mod fixed_window;
pub mod sliding_window;
pub mod token_bucket;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::caching::KeyValueStore;
use crate::core::{Clock, millis_to_datetime};
use crate::errors::{CacheError, CacheResult};
use crate::utils::key_utils::KeySpace;
use crate::utils::string_utils::validate_required_string;
use crate::utils::time_utils::Ttl;

pub use fixed_window::FixedWindowLimiter;
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

/// 한 번의 rate limit 판정 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub allowed: bool,
    /// 지금 추가로 허용되는 요청 수
    pub remaining: u64,
    pub limit: u64,
    /// 윈도우가 초기화되거나 버킷이 가득 차는 시각
    pub reset_at: DateTime<Utc>,
    /// 거부된 경우 다시 시도할 수 있을 때까지의 시간 (ms, 최소 1). 허용이면 0.
    pub retry_in_ms: u64,
    /// 현재 윈도우에 기록된 요청 수 (토큰 버킷은 없음)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_hits: Option<u64>,
}

impl RateLimitResult {
    pub(crate) fn new(
        allowed: bool,
        remaining: u64,
        limit: u64,
        now_ms: i64,
        reset_in_ms: u64,
        retry_in_ms: u64,
        total_hits: Option<u64>,
    ) -> Self {
        Self {
            allowed,
            remaining,
            limit,
            reset_at: millis_to_datetime(now_ms.saturating_add(i64::try_from(reset_in_ms).unwrap_or(i64::MAX))),
            retry_in_ms: if allowed { 0 } else { retry_in_ms.max(1) },
            total_hits,
        }
    }

    /// `Retry-After` 헤더용 초 (올림)
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_in_ms.div_ceil(1_000)
    }
}

/// rate limit 알고리즘 공통 인터페이스
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// 설정된 한도 (토큰 버킷은 용량)
    fn limit(&self) -> u64;

    /// 상태를 바꾸지 않고 다음 요청이 허용될지 조회합니다.
    async fn check(&self, id: &str) -> CacheResult<RateLimitResult>;

    /// 요청 하나를 원자적으로 소비합니다.
    async fn take(&self, id: &str) -> CacheResult<RateLimitResult>;

    /// 해당 식별자의 상태를 지웁니다.
    async fn reset(&self, id: &str) -> CacheResult<()>;
}

/// 설정으로부터 limiter를 만들기 위한 정책
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitPolicy {
    FixedWindow { prefix: String, limit: u64, window: Ttl },
    SlidingWindow { prefix: String, limit: u64, window: Ttl },
    TokenBucket { prefix: String, capacity: u64, refill_per_sec: f64 },
}

impl RateLimitPolicy {
    pub fn prefix(&self) -> &str {
        match self {
            RateLimitPolicy::FixedWindow { prefix, .. }
            | RateLimitPolicy::SlidingWindow { prefix, .. }
            | RateLimitPolicy::TokenBucket { prefix, .. } => prefix,
        }
    }
}

/// 정책에 맞는 limiter를 생성합니다.
///
/// # Errors
///
/// * `CacheError::ValidationError` - 한도/윈도우/충전 속도가 0 이하이거나 prefix가 비어 있음
pub fn build_limiter(
    policy: &RateLimitPolicy,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
) -> CacheResult<Box<dyn RateLimit>> {
    let ctx = LimiterContext::new(store, clock, keys, policy.prefix())?;
    Ok(match policy {
        RateLimitPolicy::FixedWindow { limit, window, .. } => Box::new(FixedWindowLimiter::new(ctx, *limit, *window)?),
        RateLimitPolicy::SlidingWindow { limit, window, .. } => {
            Box::new(SlidingWindowLimiter::new(ctx, *limit, *window)?)
        }
        RateLimitPolicy::TokenBucket { capacity, refill_per_sec, .. } => {
            Box::new(TokenBucketLimiter::new(ctx, *capacity, *refill_per_sec)?)
        }
    })
}

/// limiter가 공유하는 저장소/시계/키 정보
#[derive(Clone)]
pub struct LimiterContext {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    prefix: String,
}

impl LimiterContext {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, keys: KeySpace, prefix: &str) -> CacheResult<Self> {
        let prefix = validate_required_string(prefix, "rate limit prefix")?;
        Ok(Self { store, clock, keys, prefix })
    }

    /// `<prefix>:<id>`
    pub(crate) fn key(&self, id: &str) -> CacheResult<String> {
        let id = validate_required_string(id, "rate limit id")?;
        Ok(self.keys.rate_limit(&self.prefix, &id))
    }

    pub(crate) fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub(crate) async fn reset(&self, id: &str) -> CacheResult<()> {
        let key = self.key(id)?;
        self.store.del(&[key]).await?;
        Ok(())
    }
}

pub(crate) fn positive_window(window: Ttl) -> CacheResult<Ttl> {
    if window.is_zero() {
        return Err(CacheError::ValidationError("rate limit window must be positive".to_string()));
    }
    Ok(window)
}

pub(crate) fn positive_limit(limit: u64) -> CacheResult<u64> {
    if limit == 0 {
        return Err(CacheError::ValidationError("rate limit must be at least 1".to_string()));
    }
    Ok(limit)
}

/// 스크립트가 돌려준 음수가 아닌 정수
pub(crate) fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::caching::MemoryStore;
    use crate::core::ManualClock;

    #[test]
    fn test_result_retry_is_at_least_one_when_denied() {
        let denied = RateLimitResult::new(false, 0, 5, START, 0, 0, Some(6));
        assert_eq!(denied.retry_in_ms, 1);
        assert_eq!(denied.retry_after_secs(), 1);

        let allowed = RateLimitResult::new(true, 4, 5, START, 60_000, 500, Some(1));
        assert_eq!(allowed.retry_in_ms, 0);
        assert_eq!(allowed.reset_at.timestamp_millis(), START + 60_000);
    }

    #[test]
    fn test_limiter_key_uses_prefix() {
        let (_, ctx) = context("rl:login");
        assert_eq!(ctx.key("1.2.3.4").unwrap(), "rl:login:1.2.3.4");
        assert!(ctx.key("  ").is_err());
    }

    #[tokio::test]
    async fn test_build_limiter_validates_policy() {
        let clock = Arc::new(ManualClock::new(START));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new(clock.clone()));

        let bad = RateLimitPolicy::TokenBucket { prefix: "tb".into(), capacity: 10, refill_per_sec: 0.0 };
        assert!(build_limiter(&bad, store.clone(), clock.clone(), KeySpace::default()).is_err());

        let bad = RateLimitPolicy::FixedWindow { prefix: "fw".into(), limit: 0, window: Ttl::from_secs(1) };
        assert!(build_limiter(&bad, store.clone(), clock.clone(), KeySpace::default()).is_err());

        let good = RateLimitPolicy::SlidingWindow { prefix: "sw".into(), limit: 2, window: Ttl::from_secs(1) };
        let limiter = build_limiter(&good, store, clock, KeySpace::default()).unwrap();
        assert_eq!(limiter.limit(), 2);
        assert!(limiter.take("id").await.unwrap().allowed);
    }
}
