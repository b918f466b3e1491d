//! # 키-값 저장소 계약
//!
//! 신뢰 캐시 계층이 저장소에 요구하는 명령 집합을 하나의 좁은 trait로 정의합니다.
//! Redis 드라이버는 [`crate::caching::redis::RedisStore`]에서 한 번만 이 trait에
//! 맞춰지며, 비즈니스 로직은 클라이언트 종류에 따라 분기하지 않습니다.
//!
//! ## 원자성
//!
//! 읽고-고치고-쓰는 연산 중 경쟁 상태가 보안 문제로 이어지는 것(rate limit, refresh
//! token 회전, 레코드+인덱스 동시 갱신)은 모두 [`KeyValueStore::eval`]로 실행되는
//! [`AtomicScript`] 한 번의 왕복으로 처리합니다. ZSET/HASH 명령은 스크립트 내부에서만
//! 쓰이므로 trait에 노출하지 않습니다.

use async_trait::async_trait;

use crate::caching::scripts::AtomicScript;
use crate::errors::{CacheError, CacheResult};
use crate::utils::time_utils::{RoundingMode, Seconds, Ttl};

/// PTTL 조회 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// 키 없음 (PTTL = -2)
    Missing,
    /// 만료 없이 존재 (PTTL = -1)
    Persistent,
    /// 남은 수명
    Expires(Ttl),
}

impl KeyTtl {
    /// Redis PTTL 원시 응답을 해석합니다.
    pub fn from_pttl(raw: i64) -> Self {
        match raw {
            -2 => KeyTtl::Missing,
            r if r < 0 => KeyTtl::Persistent,
            r => KeyTtl::Expires(Ttl::from_millis(r as u64)),
        }
    }

    pub fn remaining(self) -> Option<Ttl> {
        match self {
            KeyTtl::Expires(ttl) => Some(ttl),
            _ => None,
        }
    }

    pub fn exists(self) -> bool {
        !matches!(self, KeyTtl::Missing)
    }
}

/// 원자 스크립트의 응답
///
/// 모든 스크립트는 문자열 배열을 반환합니다. Lua 숫자를 그대로 반환하면
/// Redis가 정수로 잘라내므로 토큰 버킷의 소수 토큰 수도 문자열로 받습니다.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptReply(Vec<String>);

impl ScriptReply {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn text(&self, index: usize) -> CacheResult<&str> {
        self.0
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| CacheError::InternalError(format!("script reply has no field {}", index)))
    }

    pub fn int(&self, index: usize) -> CacheResult<i64> {
        let raw = self.text(index)?;
        if let Ok(value) = raw.parse::<i64>() {
            return Ok(value);
        }
        raw.parse::<f64>()
            .map(|v| v as i64)
            .map_err(|_| CacheError::InternalError(format!("script reply field {} is not numeric: {}", index, raw)))
    }

    pub fn float(&self, index: usize) -> CacheResult<f64> {
        let raw = self.text(index)?;
        raw.parse::<f64>()
            .map_err(|_| CacheError::InternalError(format!("script reply field {} is not numeric: {}", index, raw)))
    }
}

impl From<Vec<String>> for ScriptReply {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

/// 신뢰 캐시 계층이 사용하는 저장소 명령 집합
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 연결 상태 확인 (PING)
    async fn ping(&self) -> CacheResult<()>;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// 값을 저장합니다. `ttl`이 있으면 `SET .. PX ttl`, 0 TTL은 거부됩니다.
    async fn set(&self, key: &str, value: &str, ttl: Option<Ttl>) -> CacheResult<()>;

    /// 삭제된 키 개수를 반환합니다.
    async fn del(&self, keys: &[String]) -> CacheResult<u64>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// 키가 존재해 만료가 설정되었으면 `true`.
    async fn pexpire(&self, key: &str, ttl: Ttl) -> CacheResult<bool>;

    async fn pttl(&self, key: &str) -> CacheResult<KeyTtl>;

    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// 새로 추가되었으면 `true`.
    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool>;

    async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64>;

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    /// 원자 스크립트를 단일 왕복으로 실행합니다.
    async fn eval(&self, script: AtomicScript, keys: &[String], args: &[String]) -> CacheResult<ScriptReply>;

    /// 초 단위 EXPIRE
    async fn expire(&self, key: &str, secs: Seconds) -> CacheResult<bool> {
        self.pexpire(key, Ttl::from_secs(secs.0)).await
    }

    /// 초 단위 TTL (올림). 키가 없거나 만료가 없으면 `None`.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Seconds>> {
        Ok(self
            .pttl(key)
            .await?
            .remaining()
            .map(|ttl| ttl.as_secs(RoundingMode::Ceil)))
    }
}

/// 0 TTL로 SET 하려는 호출을 거부합니다 (`SET PX 0`은 Redis 에러).
pub(crate) fn ensure_positive_ttl(key: &str, ttl: Option<Ttl>) -> CacheResult<()> {
    match ttl {
        Some(ttl) if ttl.is_zero() => Err(CacheError::ValidationError(format!(
            "TTL must be positive for key {}",
            key
        ))),
        _ => Ok(()),
    }
}
