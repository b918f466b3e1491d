//! # 시계 추상화
//!
//! 만료 시각 계산, rate limit 윈도우, 토큰 버킷 충전에 쓰이는 현재 시각을
//! 주입 가능한 [`Clock`]으로 제공합니다. 운영에서는 [`SystemClock`],
//! 테스트에서는 [`ManualClock`]으로 시간을 직접 진행시킵니다.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use crate::utils::time_utils::Ttl;

/// 밀리초 정밀도의 벽시계
pub trait Clock: Send + Sync {
    /// Unix epoch 기준 밀리초
    fn now_ms(&self) -> i64;

    fn now(&self) -> DateTime<Utc> {
        millis_to_datetime(self.now_ms())
    }
}

/// 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// 수동으로 진행시키는 시계
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self { now_ms: AtomicI64::new(start_ms) }
    }

    pub fn advance(&self, by: Ttl) {
        let delta = i64::try_from(by.millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// epoch 밀리초 → `DateTime<Utc>`. 표현 범위를 벗어나면 가까운 끝값으로 고정합니다.
pub fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(at) => at,
        None if ms > 0 => DateTime::<Utc>::MAX_UTC,
        None => DateTime::<Utc>::MIN_UTC,
    }
}
