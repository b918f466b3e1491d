//! 토큰 버킷 limiter
//!
//! 버킷은 HASH `{tokens, ts}`로 저장됩니다. 호출 시점에 경과 시간만큼 충전하고
//! (용량 상한), 요청한 토큰이 충분하면 소비합니다. 모자라면 충분히 쌓일 때까지의
//! 대기 시간을 돌려줍니다. 키의 TTL은 빈 버킷이 가득 차는 시간의 약 두 배입니다.

use async_trait::async_trait;

use crate::caching::AtomicScript;
use crate::errors::{CacheError, CacheResult};
use crate::services::rate_limit::{LimiterContext, RateLimit, RateLimitResult, non_negative, positive_limit};

const MIN_BUCKET_TTL_MS: u64 = 1_000;

pub struct TokenBucketLimiter {
    ctx: LimiterContext,
    capacity: u64,
    refill_per_sec: f64,
}

impl TokenBucketLimiter {
    /// # Errors
    ///
    /// * `CacheError::ValidationError` - 용량이 0이거나 충전 속도가 0 이하/유한하지 않음
    pub fn new(ctx: LimiterContext, capacity: u64, refill_per_sec: f64) -> CacheResult<Self> {
        if !refill_per_sec.is_finite() || refill_per_sec <= 0.0 {
            return Err(CacheError::ValidationError(format!(
                "refill rate must be positive, got {}",
                refill_per_sec
            )));
        }
        Ok(Self {
            ctx,
            capacity: positive_limit(capacity)?,
            refill_per_sec,
        })
    }

    fn bucket_ttl_ms(&self) -> u64 {
        let full_refill_ms = (self.capacity as f64 / self.refill_per_sec * 1_000.0).ceil();
        ((full_refill_ms * 2.0) as u64).max(MIN_BUCKET_TTL_MS)
    }

    /// 버킷이 가득 찰 때까지의 시간 (ms)
    fn until_full_ms(&self, tokens: f64) -> u64 {
        let missing = (self.capacity as f64 - tokens).max(0.0);
        (missing / (self.refill_per_sec / 1_000.0)).ceil() as u64
    }

    fn result(&self, allowed: bool, tokens: f64, next_in_ms: u64, now: i64) -> RateLimitResult {
        RateLimitResult::new(
            allowed,
            tokens.max(0.0).floor() as u64,
            self.capacity,
            now,
            self.until_full_ms(tokens),
            next_in_ms,
            None,
        )
    }

    /// `requested`개의 토큰을 원자적으로 소비합니다.
    ///
    /// # Errors
    ///
    /// * `CacheError::ValidationError` - `requested`가 0이거나 용량보다 큼 (영원히 충족될 수 없음)
    pub async fn take_n(&self, id: &str, requested: u64) -> CacheResult<RateLimitResult> {
        if requested == 0 || requested > self.capacity {
            return Err(CacheError::ValidationError(format!(
                "requested tokens must be between 1 and {}, got {}",
                self.capacity, requested
            )));
        }

        let key = self.ctx.key(id)?;
        let now = self.ctx.now_ms();
        let reply = self
            .ctx
            .store()
            .eval(
                AtomicScript::TokenBucketTake,
                &[key],
                &[
                    self.capacity.to_string(),
                    self.refill_per_sec.to_string(),
                    now.to_string(),
                    requested.to_string(),
                    self.bucket_ttl_ms().to_string(),
                ],
            )
            .await?;

        let allowed = reply.int(0)? == 1;
        let tokens = reply.float(1)?;
        let next_in = non_negative(reply.int(2)?);
        Ok(self.result(allowed, tokens, next_in, now))
    }
}

#[async_trait]
impl RateLimit for TokenBucketLimiter {
    fn limit(&self) -> u64 {
        self.capacity
    }

    async fn check(&self, id: &str) -> CacheResult<RateLimitResult> {
        let key = self.ctx.key(id)?;
        let now = self.ctx.now_ms();
        let reply = self
            .ctx
            .store()
            .eval(
                AtomicScript::TokenBucketPeek,
                &[key],
                &[self.capacity.to_string(), self.refill_per_sec.to_string(), now.to_string()],
            )
            .await?;

        let tokens = reply.float(0)?;
        let next_in = non_negative(reply.int(1)?);
        Ok(self.result(tokens >= 1.0, tokens, next_in, now))
    }

    async fn take(&self, id: &str) -> CacheResult<RateLimitResult> {
        self.take_n(id, 1).await
    }

    async fn reset(&self, id: &str) -> CacheResult<()> {
        self.ctx.reset(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::KeyTtl;
    use crate::services::rate_limit::test_support::*;
    use crate::utils::time_utils::Ttl;

    #[tokio::test]
    async fn test_drain_then_refill_bounded_by_capacity() {
        let (clock, ctx) = context("tb");
        let limiter = TokenBucketLimiter::new(ctx, 10, 1.0).unwrap();

        let drained = limiter.take_n("client", 10).await.unwrap();
        assert!(drained.allowed);
        assert_eq!(drained.remaining, 0);

        let denied = limiter.take("client").await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_in_ms, 1_000);

        clock.advance(Ttl::from_secs(5));
        assert_eq!(limiter.check("client").await.unwrap().remaining, 5);

        clock.advance(Ttl::from_secs(100));
        let full = limiter.check("client").await.unwrap();
        assert_eq!(full.remaining, 10);
        assert_eq!(full.reset_at.timestamp_millis(), START + 105_000);
    }

    #[tokio::test]
    async fn test_insufficient_tokens_report_wait_time() {
        let (clock, ctx) = context("tb");
        let limiter = TokenBucketLimiter::new(ctx, 4, 2.0).unwrap();

        assert!(limiter.take_n("client", 4).await.unwrap().allowed);
        clock.advance(Ttl::from_millis(1_500));

        let denied = limiter.take_n("client", 4).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 3);
        assert_eq!(denied.retry_in_ms, 500);

        assert!(limiter.take_n("client", 3).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let (_, ctx) = context("tb");
        assert!(TokenBucketLimiter::new(ctx.clone(), 5, 0.0).is_err());
        assert!(TokenBucketLimiter::new(ctx.clone(), 5, f64::NAN).is_err());

        let limiter = TokenBucketLimiter::new(ctx, 5, 1.0).unwrap();
        assert!(matches!(
            limiter.take_n("client", 6).await,
            Err(CacheError::ValidationError(_))
        ));
        assert!(limiter.take_n("client", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_idle_bucket_expires() {
        let (_, ctx) = context("tb");
        let limiter_ctx = ctx.clone();
        let limiter = TokenBucketLimiter::new(ctx, 10, 1.0).unwrap();

        limiter.take("client").await.unwrap();
        let key = limiter_ctx.key("client").unwrap();
        assert_eq!(
            limiter_ctx.store().pttl(&key).await.unwrap(),
            KeyTtl::Expires(Ttl::from_secs(20))
        );
    }
}
