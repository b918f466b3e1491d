//! # 인메모리 저장소
//!
//! 단일 프로세스용 [`KeyValueStore`] 구현입니다. 테스트와 Redis 없는 로컬 실행에서 사용합니다.
//!
//! 만료는 주입된 [`Clock`] 기준으로 접근 시점에 지연 처리하며, 모든
//! [`AtomicScript`]는 하나의 잠금 안에서 Lua 버전과 같은 의미로 실행됩니다.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::caching::scripts::AtomicScript;
use crate::caching::store::{KeyTtl, KeyValueStore, ScriptReply, ensure_positive_ttl};
use crate::core::Clock;
use crate::errors::{CacheError, CacheResult};
use crate::utils::time_utils::{Ttl, remaining_until};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    /// member → score
    ZSet(BTreeMap<String, f64>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self { value, expires_at: None }
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::InternalError(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
        key
    ))
}

/// 잠금을 잡은 상태의 키 공간 뷰
struct State<'a> {
    now: i64,
    entries: &'a mut HashMap<String, Entry>,
}

impl State<'_> {
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let expired = self.entries.get(key).is_some_and(|e| e.is_expired(self.now));
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.live(key).is_some() && self.entries.remove(key).is_some()
    }

    fn pttl(&mut self, key: &str) -> KeyTtl {
        let now = self.now;
        match self.live(key) {
            None => KeyTtl::Missing,
            Some(Entry { expires_at: None, .. }) => KeyTtl::Persistent,
            Some(Entry { expires_at: Some(at), .. }) => KeyTtl::Expires(remaining_until(now, *at)),
        }
    }

    fn pttl_raw(&mut self, key: &str) -> i64 {
        match self.pttl(key) {
            KeyTtl::Missing => -2,
            KeyTtl::Persistent => -1,
            KeyTtl::Expires(ttl) => ttl.millis_i64(),
        }
    }

    fn pexpire(&mut self, key: &str, ms: i64) -> bool {
        let now = self.now;
        if ms <= 0 {
            return self.remove(key);
        }
        match self.live(key) {
            Some(entry) => {
                entry.expires_at = Some(now.saturating_add(ms));
                true
            }
            None => false,
        }
    }

    fn get_string(&mut self, key: &str) -> CacheResult<Option<String>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set_string(&mut self, key: &str, value: String, ttl_ms: Option<i64>) {
        let expires_at = ttl_ms.map(|ms| self.now.saturating_add(ms));
        self.entries.insert(
            key.to_string(),
            Entry { value: Value::Str(value), expires_at },
        );
    }

    /// INCRBY: 기존 만료 시각은 유지합니다.
    fn incr_by(&mut self, key: &str, by: i64) -> CacheResult<i64> {
        let current = match self.get_string(key)? {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| CacheError::InternalError(format!("value is not an integer: {}", key)))?,
            None => 0,
        };
        let next = current + by;
        match self.live(key) {
            Some(entry) => entry.value = Value::Str(next.to_string()),
            None => {
                self.entries.insert(key.to_string(), Entry::new(Value::Str(next.to_string())));
            }
        }
        Ok(next)
    }

    fn set_mut(&mut self, key: &str) -> CacheResult<&mut BTreeSet<String>> {
        if self.live(key).is_none() {
            self.entries.insert(key.to_string(), Entry::new(Value::Set(BTreeSet::new())));
        }
        match self.entries.get_mut(key) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set),
            _ => Err(wrong_type(key)),
        }
    }

    fn sadd(&mut self, key: &str, member: &str) -> CacheResult<bool> {
        Ok(self.set_mut(key)?.insert(member.to_string()))
    }

    fn srem(&mut self, key: &str, members: &[String]) -> CacheResult<u64> {
        let (removed, empty) = match self.live(key) {
            None => return Ok(0),
            Some(Entry { value: Value::Set(set), .. }) => {
                let removed = members.iter().filter(|m| set.remove(m.as_str())).count() as u64;
                (removed, set.is_empty())
            }
            Some(_) => return Err(wrong_type(key)),
        };
        if empty {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    fn smembers(&mut self, key: &str) -> CacheResult<Vec<String>> {
        match self.live(key) {
            None => Ok(Vec::new()),
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn zset_mut(&mut self, key: &str) -> CacheResult<&mut BTreeMap<String, f64>> {
        if self.live(key).is_none() {
            self.entries.insert(key.to_string(), Entry::new(Value::ZSet(BTreeMap::new())));
        }
        match self.entries.get_mut(key) {
            Some(Entry { value: Value::ZSet(zset), .. }) => Ok(zset),
            _ => Err(wrong_type(key)),
        }
    }

    fn zset_snapshot(&mut self, key: &str) -> CacheResult<BTreeMap<String, f64>> {
        match self.live(key) {
            None => Ok(BTreeMap::new()),
            Some(Entry { value: Value::ZSet(zset), .. }) => Ok(zset.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn hash_fields(&mut self, key: &str, fields: &[&str]) -> CacheResult<Vec<Option<String>>> {
        match self.live(key) {
            None => Ok(vec![None; fields.len()]),
            Some(Entry { value: Value::Hash(hash), .. }) => {
                Ok(fields.iter().map(|f| hash.get(*f).cloned()).collect())
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn hash_set(&mut self, key: &str, pairs: &[(&str, String)]) -> CacheResult<()> {
        if self.live(key).is_none() {
            self.entries.insert(key.to_string(), Entry::new(Value::Hash(HashMap::new())));
        }
        match self.entries.get_mut(key) {
            Some(Entry { value: Value::Hash(hash), .. }) => {
                for (field, value) in pairs {
                    hash.insert(field.to_string(), value.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    fn drop_if_empty_zset(&mut self, key: &str) {
        let empty = matches!(self.entries.get(key), Some(Entry { value: Value::ZSet(z), .. }) if z.is_empty());
        if empty {
            self.entries.remove(key);
        }
    }

    /// 만료 시각을 현재 값과 `wanted` 중 큰 쪽으로 맞춥니다.
    fn extend_expiry(&mut self, key: &str, wanted_ms: i64) {
        let current = self.pttl_raw(key);
        if current < wanted_ms {
            self.pexpire(key, wanted_ms);
        }
    }
}

fn arg<'a>(args: &'a [String], index: usize, script: AtomicScript) -> CacheResult<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| CacheError::InternalError(format!("{} is missing ARGV[{}]", script.name(), index + 1)))
}

fn arg_f64(args: &[String], index: usize, script: AtomicScript) -> CacheResult<f64> {
    let raw = arg(args, index, script)?;
    raw.parse::<f64>()
        .map_err(|_| CacheError::InternalError(format!("{} ARGV[{}] is not a number: {}", script.name(), index + 1, raw)))
}

fn arg_i64(args: &[String], index: usize, script: AtomicScript) -> CacheResult<i64> {
    arg_f64(args, index, script).map(|v| v as i64)
}

/// Lua `tostring`과 같은 정수/소수 표기
fn lua_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn reply(values: Vec<String>) -> ScriptReply {
    ScriptReply::new(values)
}

/// 인메모리 [`KeyValueStore`]
///
/// ```rust,ignore
/// let clock = Arc::new(ManualClock::new(1_700_000_000_000));
/// let store = MemoryStore::new(clock.clone());
/// store.set("k", "v", Some(Ttl::from_secs(1))).await?;
/// clock.advance(Ttl::from_secs(2));
/// assert_eq!(store.get("k").await?, None);
/// ```
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 만료되지 않은 키 개수 (DBSIZE)
    pub fn key_count(&self) -> usize {
        let now = self.clock.now_ms();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<'_>) -> CacheResult<R>) -> CacheResult<R> {
        let now = self.clock.now_ms();
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| CacheError::InternalError("memory store lock poisoned".to_string()))?;
        let mut state = State { now, entries: &mut guard };
        f(&mut state)
    }

    fn run_script(state: &mut State<'_>, script: AtomicScript, keys: &[String], args: &[String]) -> CacheResult<ScriptReply> {
        match script {
            AtomicScript::FixedWindowHit => {
                let key = &keys[0];
                let window = arg_i64(args, 0, script)?;
                let cost = arg_i64(args, 1, script)?;
                let count = state.incr_by(key, cost)?;
                let mut ttl = state.pttl_raw(key);
                if ttl < 0 {
                    state.pexpire(key, window);
                    ttl = window;
                }
                Ok(reply(vec![count.to_string(), ttl.to_string()]))
            }
            AtomicScript::FixedWindowPeek => {
                let key = &keys[0];
                let window = arg_i64(args, 0, script)?;
                let count = match state.get_string(key)? {
                    Some(raw) => raw.parse::<i64>().unwrap_or(0),
                    None => 0,
                };
                let mut ttl = state.pttl_raw(key);
                if ttl < 0 {
                    ttl = window;
                }
                Ok(reply(vec![count.to_string(), ttl.to_string()]))
            }
            AtomicScript::SlidingWindowHit => {
                let key = &keys[0];
                let now_ms = arg_f64(args, 0, script)?;
                let window = arg_f64(args, 1, script)?;
                let limit = arg_i64(args, 2, script)?;
                let member = arg(args, 3, script)?.to_string();

                let floor = now_ms - window;
                let zset = state.zset_mut(key)?;
                zset.retain(|_, score| *score > floor);
                let mut count = zset.len() as i64;
                let mut allowed = 0;
                if count < limit {
                    zset.insert(member, now_ms);
                    count = zset.len() as i64;
                    allowed = 1;
                }
                let oldest = zset.values().cloned().fold(f64::INFINITY, f64::min);
                state.drop_if_empty_zset(key);
                if count > 0 {
                    state.pexpire(key, window as i64);
                }
                let reset_in = if oldest.is_finite() { (oldest + window - now_ms).max(0.0) } else { 0.0 };
                Ok(reply(vec![allowed.to_string(), count.to_string(), lua_number(reset_in)]))
            }
            AtomicScript::SlidingWindowPeek => {
                let key = &keys[0];
                let now_ms = arg_f64(args, 0, script)?;
                let window = arg_f64(args, 1, script)?;
                let floor = now_ms - window;
                let zset = state.zset_snapshot(key)?;
                let live: Vec<f64> = zset.values().cloned().filter(|score| *score > floor).collect();
                let oldest = live.iter().cloned().fold(f64::INFINITY, f64::min);
                let reset_in = if oldest.is_finite() { (oldest + window - now_ms).max(0.0) } else { 0.0 };
                Ok(reply(vec![live.len().to_string(), lua_number(reset_in)]))
            }
            AtomicScript::TokenBucketTake | AtomicScript::TokenBucketPeek => {
                let key = &keys[0];
                let capacity = arg_f64(args, 0, script)?;
                let rate = arg_f64(args, 1, script)? / 1000.0;
                let now_ms = arg_f64(args, 2, script)?;
                let fields = state.hash_fields(key, &["tokens", "ts"])?;
                let parsed = (
                    fields[0].as_deref().and_then(|v| v.parse::<f64>().ok()),
                    fields[1].as_deref().and_then(|v| v.parse::<f64>().ok()),
                );
                let (stored, ts) = match parsed {
                    (Some(tokens), Some(ts)) => (tokens, ts),
                    _ => (capacity, now_ms),
                };
                let elapsed = (now_ms - ts).max(0.0);
                let mut tokens = capacity.min(stored + elapsed * rate);

                if script == AtomicScript::TokenBucketPeek {
                    let next_in = if tokens < 1.0 { ((1.0 - tokens) / rate).ceil() } else { 0.0 };
                    return Ok(reply(vec![lua_number(tokens), lua_number(next_in)]));
                }

                let requested = arg_f64(args, 3, script)?;
                let ttl_ms = arg_i64(args, 4, script)?;
                let mut allowed = 0;
                let mut next_in = 0.0;
                if tokens >= requested {
                    tokens -= requested;
                    allowed = 1;
                } else {
                    next_in = ((requested - tokens) / rate).ceil();
                }
                state.hash_set(key, &[("tokens", lua_number(tokens)), ("ts", lua_number(now_ms.max(ts)))])?;
                state.pexpire(key, ttl_ms);
                Ok(reply(vec![allowed.to_string(), lua_number(tokens), lua_number(next_in)]))
            }
            AtomicScript::PutIndexed => {
                let value = arg(args, 0, script)?.to_string();
                let ttl_ms = arg_i64(args, 1, script)?;
                let member = arg(args, 2, script)?;
                let index_min = arg_i64(args, 3, script)?;
                let only_existing = args.get(4).map(String::as_str) == Some("1");
                if only_existing && state.live(&keys[0]).is_none() {
                    return Ok(reply(vec!["0".to_string()]));
                }
                state.set_string(&keys[0], value, Some(ttl_ms));
                state.sadd(&keys[1], member)?;
                state.extend_expiry(&keys[1], ttl_ms.max(index_min));
                Ok(reply(vec!["1".to_string()]))
            }
            AtomicScript::DeleteIndexed => {
                let member = arg(args, 0, script)?.to_string();
                let removed = state.remove(&keys[0]);
                state.srem(&keys[1], &[member])?;
                Ok(reply(vec![if removed { "1" } else { "0" }.to_string()]))
            }
            AtomicScript::RevokeIndexed => {
                let prefix = arg(args, 0, script)?;
                let keep = args.get(1).map(String::as_str).unwrap_or("");
                let targets: Vec<String> = state
                    .smembers(&keys[0])?
                    .into_iter()
                    .filter(|member| member != keep)
                    .collect();
                let removed = targets
                    .iter()
                    .filter(|member| state.remove(&format!("{}{}", prefix, member)))
                    .count();
                state.srem(&keys[0], &targets)?;
                Ok(reply(vec![removed.to_string()]))
            }
            AtomicScript::RotateRefresh => {
                let expected = arg(args, 0, script)?;
                let current = match state.get_string(&keys[0])? {
                    None => return Ok(reply(vec!["0".to_string()])),
                    Some(current) => current,
                };
                if current != expected {
                    return Ok(reply(vec!["-1".to_string()]));
                }
                let new_value = arg(args, 1, script)?.to_string();
                let new_ttl = arg_i64(args, 2, script)?;
                let old_member = arg(args, 3, script)?.to_string();
                let new_member = arg(args, 4, script)?;
                let index_ttl = arg_i64(args, 5, script)?;
                let marker_value = arg(args, 6, script)?.to_string();
                let marker_ttl = arg_i64(args, 7, script)?;

                state.remove(&keys[0]);
                state.set_string(&keys[1], new_value, Some(new_ttl));
                state.srem(&keys[2], &[old_member])?;
                state.sadd(&keys[2], new_member)?;
                state.extend_expiry(&keys[2], index_ttl);
                if marker_ttl > 0 {
                    state.set_string(&keys[3], marker_value, Some(marker_ttl));
                }
                Ok(reply(vec!["1".to_string()]))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn ping(&self) -> CacheResult<()> {
        self.with_state(|_| Ok(()))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.with_state(|state| state.get_string(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Ttl>) -> CacheResult<()> {
        ensure_positive_ttl(key, ttl)?;
        self.with_state(|state| {
            state.set_string(key, value.to_string(), ttl.map(Ttl::millis_i64));
            Ok(())
        })
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        self.with_state(|state| Ok(keys.iter().filter(|k| state.remove(k)).count() as u64))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.with_state(|state| Ok(state.live(key).is_some()))
    }

    async fn pexpire(&self, key: &str, ttl: Ttl) -> CacheResult<bool> {
        self.with_state(|state| Ok(state.pexpire(key, ttl.millis_i64())))
    }

    async fn pttl(&self, key: &str) -> CacheResult<KeyTtl> {
        self.with_state(|state| Ok(state.pttl(key)))
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.with_state(|state| state.incr_by(key, 1))
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.with_state(|state| state.sadd(key, member))
    }

    async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        self.with_state(|state| state.srem(key, members))
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        self.with_state(|state| state.smembers(key))
    }

    async fn eval(&self, script: AtomicScript, keys: &[String], args: &[String]) -> CacheResult<ScriptReply> {
        if keys.len() != script.key_count() {
            return Err(CacheError::InternalError(format!(
                "{} expects {} keys, got {}",
                script.name(),
                script.key_count(),
                keys.len()
            )));
        }
        self.with_state(|state| Self::run_script(state, script, keys, args))
    }
}
