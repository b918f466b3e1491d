//! 슬라이딩 윈도우 limiter
//!
//! 이벤트마다 `timestamp-random` 멤버를 ZSET에 기록합니다. 매 호출마다 윈도우 밖의
//! 이벤트를 지우고, 남은 개수가 한도 미만일 때만 새 이벤트를 추가합니다.
//! 집합의 TTL은 윈도우 길이와 같아서 쓰이지 않는 키는 스스로 사라집니다.

use async_trait::async_trait;

use crate::caching::AtomicScript;
use crate::errors::CacheResult;
use crate::services::rate_limit::{
    LimiterContext, RateLimit, RateLimitResult, non_negative, positive_limit, positive_window,
};
use crate::utils::hash_utils::random_suffix;
use crate::utils::time_utils::Ttl;

pub struct SlidingWindowLimiter {
    ctx: LimiterContext,
    limit: u64,
    window: Ttl,
}

impl SlidingWindowLimiter {
    pub fn new(ctx: LimiterContext, limit: u64, window: Ttl) -> CacheResult<Self> {
        Ok(Self {
            ctx,
            limit: positive_limit(limit)?,
            window: positive_window(window)?,
        })
    }

    fn result(&self, allowed: bool, count: u64, reset_in: u64, now: i64) -> RateLimitResult {
        // 기록이 없으면 윈도우 전체가 남은 시간
        let reset_in = if count == 0 { self.window.millis() } else { reset_in };
        RateLimitResult::new(
            allowed,
            self.limit.saturating_sub(count),
            self.limit,
            now,
            reset_in,
            reset_in,
            Some(count),
        )
    }
}

#[async_trait]
impl RateLimit for SlidingWindowLimiter {
    fn limit(&self) -> u64 {
        self.limit
    }

    async fn check(&self, id: &str) -> CacheResult<RateLimitResult> {
        let key = self.ctx.key(id)?;
        let now = self.ctx.now_ms();
        let reply = self
            .ctx
            .store()
            .eval(
                AtomicScript::SlidingWindowPeek,
                &[key],
                &[now.to_string(), self.window.millis().to_string()],
            )
            .await?;

        let count = non_negative(reply.int(0)?);
        let reset_in = non_negative(reply.int(1)?);
        Ok(self.result(count < self.limit, count, reset_in, now))
    }

    async fn take(&self, id: &str) -> CacheResult<RateLimitResult> {
        let key = self.ctx.key(id)?;
        let now = self.ctx.now_ms();
        let member = format!("{}-{}", now, random_suffix());
        let reply = self
            .ctx
            .store()
            .eval(
                AtomicScript::SlidingWindowHit,
                &[key],
                &[
                    now.to_string(),
                    self.window.millis().to_string(),
                    self.limit.to_string(),
                    member,
                ],
            )
            .await?;

        let allowed = reply.int(0)? == 1;
        let count = non_negative(reply.int(1)?);
        let reset_in = non_negative(reply.int(2)?);
        Ok(self.result(allowed, count, reset_in, now))
    }

    async fn reset(&self, id: &str) -> CacheResult<()> {
        self.ctx.reset(id).await
    }
}
