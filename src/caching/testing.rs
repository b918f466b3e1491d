//! 경쟁 상황을 재현하는 테스트용 저장소 래퍼

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::caching::{AtomicScript, KeyTtl, KeyValueStore, MemoryStore, ScriptReply};
use crate::errors::CacheResult;
use crate::utils::time_utils::Ttl;

/// 끼어들 스크립트 호출 (script, keys, args)
type Interleaved = (AtomicScript, Vec<String>, Vec<String>);

/// [`MemoryStore`]에 두 가지 경쟁 지점을 심은 래퍼
///
/// - `trigger` 스크립트가 처음 실행되기 직전에 `interleave`를 먼저 실행합니다.
/// - `gate_prefix`로 시작하는 키의 GET 처음 `gate_count`번은 모두 도착할 때까지 기다립니다.
pub struct RacingStore {
    inner: Arc<MemoryStore>,
    trigger: Option<AtomicScript>,
    interleave: Mutex<Option<Interleaved>>,
    gate_prefix: Option<String>,
    gate_left: AtomicUsize,
    gate: Arc<Barrier>,
}

impl RacingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            trigger: None,
            interleave: Mutex::new(None),
            gate_prefix: None,
            gate_left: AtomicUsize::new(0),
            gate: Arc::new(Barrier::new(1)),
        }
    }

    /// `trigger` 직전에 다른 요청의 스크립트를 한 번 실행합니다.
    pub fn before(mut self, trigger: AtomicScript, script: AtomicScript, keys: Vec<String>, args: Vec<String>) -> Self {
        self.trigger = Some(trigger);
        self.interleave = Mutex::new(Some((script, keys, args)));
        self
    }

    /// `prefix` 키를 읽는 첫 `count`개의 요청이 모두 읽을 때까지 붙잡아 둡니다.
    pub fn gate_reads(mut self, prefix: impl Into<String>, count: usize) -> Self {
        self.gate_prefix = Some(prefix.into());
        self.gate_left = AtomicUsize::new(count);
        self.gate = Arc::new(Barrier::new(count));
        self
    }

    fn take_interleave(&self, script: AtomicScript) -> Option<Interleaved> {
        if self.trigger != Some(script) {
            return None;
        }
        self.interleave.lock().ok().and_then(|mut pending| pending.take())
    }

    fn should_gate(&self, key: &str) -> bool {
        let Some(prefix) = &self.gate_prefix else {
            return false;
        };
        key.starts_with(prefix.as_str())
            && self
                .gate_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
    }
}

#[async_trait]
impl KeyValueStore for RacingStore {
    async fn ping(&self) -> CacheResult<()> {
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self.inner.get(key).await?;
        if self.should_gate(key) {
            self.gate.wait().await;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Ttl>) -> CacheResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        self.inner.del(keys).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.inner.exists(key).await
    }

    async fn pexpire(&self, key: &str, ttl: Ttl) -> CacheResult<bool> {
        self.inner.pexpire(key, ttl).await
    }

    async fn pttl(&self, key: &str) -> CacheResult<KeyTtl> {
        self.inner.pttl(key).await
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.inner.incr(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        self.inner.srem(key, members).await
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        self.inner.smembers(key).await
    }

    async fn eval(&self, script: AtomicScript, keys: &[String], args: &[String]) -> CacheResult<ScriptReply> {
        if let Some((other, other_keys, other_args)) = self.take_interleave(script) {
            self.inner.eval(other, &other_keys, &other_args).await?;
        }
        self.inner.eval(script, keys, args).await
    }
}
