//! 고정 윈도우 limiter
//!
//! 첫 요청에서 카운터에 윈도우 길이만큼의 만료를 걸고, 이후 요청은 증가만 합니다.
//! `reset_at`은 카운터 자신의 TTL에서 계산합니다.

use async_trait::async_trait;

use crate::caching::AtomicScript;
use crate::errors::CacheResult;
use crate::services::rate_limit::{
    LimiterContext, RateLimit, RateLimitResult, non_negative, positive_limit, positive_window,
};
use crate::utils::time_utils::Ttl;

pub struct FixedWindowLimiter {
    ctx: LimiterContext,
    limit: u64,
    window: Ttl,
}

impl FixedWindowLimiter {
    pub fn new(ctx: LimiterContext, limit: u64, window: Ttl) -> CacheResult<Self> {
        Ok(Self {
            ctx,
            limit: positive_limit(limit)?,
            window: positive_window(window)?,
        })
    }

    /// `cost`만큼 소비합니다.
    pub async fn take_cost(&self, id: &str, cost: u64) -> CacheResult<RateLimitResult> {
        let key = self.ctx.key(id)?;
        let now = self.ctx.now_ms();
        let reply = self
            .ctx
            .store()
            .eval(
                AtomicScript::FixedWindowHit,
                &[key],
                &[self.window.millis().to_string(), cost.max(1).to_string()],
            )
            .await?;

        let count = non_negative(reply.int(0)?);
        let ttl_ms = non_negative(reply.int(1)?);
        let allowed = count <= self.limit;

        Ok(RateLimitResult::new(
            allowed,
            self.limit.saturating_sub(count),
            self.limit,
            now,
            ttl_ms,
            ttl_ms,
            Some(count),
        ))
    }
}

#[async_trait]
impl RateLimit for FixedWindowLimiter {
    fn limit(&self) -> u64 {
        self.limit
    }

    async fn check(&self, id: &str) -> CacheResult<RateLimitResult> {
        let key = self.ctx.key(id)?;
        let now = self.ctx.now_ms();
        let reply = self
            .ctx
            .store()
            .eval(AtomicScript::FixedWindowPeek, &[key], &[self.window.millis().to_string()])
            .await?;

        let count = non_negative(reply.int(0)?);
        let ttl_ms = non_negative(reply.int(1)?);

        Ok(RateLimitResult::new(
            count < self.limit,
            self.limit.saturating_sub(count),
            self.limit,
            now,
            ttl_ms,
            ttl_ms,
            Some(count),
        ))
    }

    async fn take(&self, id: &str) -> CacheResult<RateLimitResult> {
        self.take_cost(id, 1).await
    }

    async fn reset(&self, id: &str) -> CacheResult<()> {
        self.ctx.reset(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rate_limit::test_support::*;

    #[tokio::test]
    async fn test_sixth_call_in_window_is_denied() {
        let (_, ctx) = context("rl");
        let limiter = FixedWindowLimiter::new(ctx, 5, Ttl::from_secs(60)).unwrap();

        for i in 1..=5 {
            let result = limiter.take("u1").await.unwrap();
            assert!(result.allowed, "call {} should be allowed", i);
            assert_eq!(result.remaining, 5 - i);
        }

        let sixth = limiter.take("u1").await.unwrap();
        assert!(!sixth.allowed);
        assert!(sixth.retry_in_ms > 0);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.total_hits, Some(6));
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let (clock, ctx) = context("rl");
        let limiter = FixedWindowLimiter::new(ctx, 1, Ttl::from_secs(60)).unwrap();

        assert!(limiter.take("u1").await.unwrap().allowed);
        clock.advance(Ttl::from_secs(30));
        let denied = limiter.take("u1").await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_in_ms, 30_000);
        assert_eq!(denied.reset_at.timestamp_millis(), START + 60_000);

        clock.advance(Ttl::from_secs(30));
        assert!(limiter.take("u1").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_check_does_not_consume_and_reset_clears() {
        let (_, ctx) = context("rl");
        let limiter = FixedWindowLimiter::new(ctx, 2, Ttl::from_secs(60)).unwrap();

        for _ in 0..3 {
            assert!(limiter.check("u1").await.unwrap().allowed);
        }
        limiter.take("u1").await.unwrap();
        limiter.take("u1").await.unwrap();
        assert!(!limiter.check("u1").await.unwrap().allowed);

        limiter.reset("u1").await.unwrap();
        let after = limiter.check("u1").await.unwrap();
        assert!(after.allowed);
        assert_eq!(after.remaining, 2);
    }

    #[tokio::test]
    async fn test_identifiers_are_isolated() {
        let (_, ctx) = context("rl");
        let limiter = FixedWindowLimiter::new(ctx, 1, Ttl::from_secs(60)).unwrap();

        assert!(limiter.take("a").await.unwrap().allowed);
        assert!(limiter.take("b").await.unwrap().allowed);
        assert!(!limiter.take("a").await.unwrap().allowed);
    }
}
