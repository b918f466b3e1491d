//! # 원자 스크립트 카탈로그
//!
//! 경쟁 상태가 보안 우회로 이어지는 모든 읽고-쓰기 연산을 Lua 스크립트로 정의합니다.
//! 두 요청이 동시에 `count = N`을 읽고 각각 증가시키는 식의 경쟁은 여기서 원천 차단됩니다.
//!
//! | 스크립트 | KEYS | ARGV | 응답 |
//! |----------|------|------|------|
//! | `FixedWindowHit` | counter | window_ms, cost | count, pttl |
//! | `FixedWindowPeek` | counter | window_ms | count, pttl |
//! | `SlidingWindowHit` | zset | now_ms, window_ms, limit, member | allowed, count, reset_in_ms |
//! | `SlidingWindowPeek` | zset | now_ms, window_ms | count, reset_in_ms |
//! | `TokenBucketTake` | hash | capacity, refill_per_sec, now_ms, requested, ttl_ms | allowed, tokens, next_in_ms |
//! | `TokenBucketPeek` | hash | capacity, refill_per_sec, now_ms | tokens, next_in_ms |
//! | `PutIndexed` | record, index | value, ttl_ms, member, index_min_ttl_ms, [only_existing] | 1 / 0 |
//! | `DeleteIndexed` | record, index | member | deleted |
//! | `RevokeIndexed` | index | record_prefix, [keep_member] | deleted |
//! | `RotateRefresh` | old, new, index, marker | expected, new_value, ttl_ms, old_member, new_member, index_ttl_ms, marker_value, marker_ttl_ms | 1 / 0 / -1 |
//!
//! `RevokeIndexed`는 색인 멤버로 레코드 키(`record_prefix` + 멤버)를 만들어 지우므로
//! KEYS에 선언되지 않은 키를 건드립니다. Redis Cluster에서는 키 공간 전체가
//! 같은 해시 태그를 써야 합니다 ([`crate::utils::key_utils::KeyBuilder::with_hash_tag`]).
//!
//! Redis가 아닌 저장소([`crate::caching::memory::MemoryStore`])는 같은 의미를
//! 단일 잠금 아래에서 직접 구현합니다.

/// 저장소에서 원자적으로 실행되는 연산
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicScript {
    FixedWindowHit,
    FixedWindowPeek,
    SlidingWindowHit,
    SlidingWindowPeek,
    TokenBucketTake,
    TokenBucketPeek,
    PutIndexed,
    DeleteIndexed,
    RevokeIndexed,
    RotateRefresh,
}

impl AtomicScript {
    pub const ALL: [AtomicScript; 10] = [
        AtomicScript::FixedWindowHit,
        AtomicScript::FixedWindowPeek,
        AtomicScript::SlidingWindowHit,
        AtomicScript::SlidingWindowPeek,
        AtomicScript::TokenBucketTake,
        AtomicScript::TokenBucketPeek,
        AtomicScript::PutIndexed,
        AtomicScript::DeleteIndexed,
        AtomicScript::RevokeIndexed,
        AtomicScript::RotateRefresh,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AtomicScript::FixedWindowHit => "fixed_window_hit",
            AtomicScript::FixedWindowPeek => "fixed_window_peek",
            AtomicScript::SlidingWindowHit => "sliding_window_hit",
            AtomicScript::SlidingWindowPeek => "sliding_window_peek",
            AtomicScript::TokenBucketTake => "token_bucket_take",
            AtomicScript::TokenBucketPeek => "token_bucket_peek",
            AtomicScript::PutIndexed => "put_indexed",
            AtomicScript::DeleteIndexed => "delete_indexed",
            AtomicScript::RevokeIndexed => "revoke_indexed",
            AtomicScript::RotateRefresh => "rotate_refresh",
        }
    }

    /// 기대하는 KEYS 개수
    pub fn key_count(self) -> usize {
        match self {
            AtomicScript::PutIndexed | AtomicScript::DeleteIndexed => 2,
            AtomicScript::RotateRefresh => 4,
            _ => 1,
        }
    }

    pub fn lua(self) -> &'static str {
        match self {
            AtomicScript::FixedWindowHit => FIXED_WINDOW_HIT,
            AtomicScript::FixedWindowPeek => FIXED_WINDOW_PEEK,
            AtomicScript::SlidingWindowHit => SLIDING_WINDOW_HIT,
            AtomicScript::SlidingWindowPeek => SLIDING_WINDOW_PEEK,
            AtomicScript::TokenBucketTake => TOKEN_BUCKET_TAKE,
            AtomicScript::TokenBucketPeek => TOKEN_BUCKET_PEEK,
            AtomicScript::PutIndexed => PUT_INDEXED,
            AtomicScript::DeleteIndexed => DELETE_INDEXED,
            AtomicScript::RevokeIndexed => REVOKE_INDEXED,
            AtomicScript::RotateRefresh => ROTATE_REFRESH,
        }
    }
}

const FIXED_WINDOW_HIT: &str = r#"
local count = redis.call('INCRBY', KEYS[1], ARGV[2])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {tostring(count), tostring(ttl)}
"#;

const FIXED_WINDOW_PEEK: &str = r#"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  ttl = tonumber(ARGV[1])
end
return {tostring(count), tostring(ttl)}
"#;

const SLIDING_WINDOW_HIT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local allowed = 0
if count < limit then
  redis.call('ZADD', key, now, ARGV[4])
  count = count + 1
  allowed = 1
end
if count > 0 then
  redis.call('PEXPIRE', key, window)
end
local reset_in = 0
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset_in = math.max(0, tonumber(oldest[2]) + window - now)
end
return {tostring(allowed), tostring(count), tostring(reset_in)}
"#;

const SLIDING_WINDOW_PEEK: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local floor = '(' .. tostring(now - window)
local count = redis.call('ZCOUNT', key, floor, '+inf')
local reset_in = 0
local oldest = redis.call('ZRANGEBYSCORE', key, floor, '+inf', 'WITHSCORES', 'LIMIT', 0, 1)
if oldest[2] then
  reset_in = math.max(0, tonumber(oldest[2]) + window - now)
end
return {tostring(count), tostring(reset_in)}
"#;

const TOKEN_BUCKET_TAKE: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2]) / 1000
local now = tonumber(ARGV[3])
local requested = tonumber(ARGV[4])
local state = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(state[1])
local ts = tonumber(state[2])
if tokens == nil or ts == nil then
  tokens = capacity
  ts = now
end
local elapsed = math.max(0, now - ts)
tokens = math.min(capacity, tokens + elapsed * rate)
local allowed = 0
local next_in = 0
if tokens >= requested then
  tokens = tokens - requested
  allowed = 1
else
  next_in = math.ceil((requested - tokens) / rate)
end
redis.call('HMSET', key, 'tokens', tostring(tokens), 'ts', tostring(math.max(now, ts)))
redis.call('PEXPIRE', key, ARGV[5])
return {tostring(allowed), tostring(tokens), tostring(next_in)}
"#;

const TOKEN_BUCKET_PEEK: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2]) / 1000
local now = tonumber(ARGV[3])
local state = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(state[1])
local ts = tonumber(state[2])
if tokens == nil or ts == nil then
  tokens = capacity
  ts = now
end
tokens = math.min(capacity, tokens + math.max(0, now - ts) * rate)
local next_in = 0
if tokens < 1 then
  next_in = math.ceil((1 - tokens) / rate)
end
return {tostring(tokens), tostring(next_in)}
"#;

const PUT_INDEXED: &str = r#"
if ARGV[5] == '1' and redis.call('EXISTS', KEYS[1]) == 0 then
  return {'0'}
end
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
redis.call('SADD', KEYS[2], ARGV[3])
local wanted = math.max(tonumber(ARGV[2]), tonumber(ARGV[4]))
local current = redis.call('PTTL', KEYS[2])
if current < wanted then
  redis.call('PEXPIRE', KEYS[2], wanted)
end
return {'1'}
"#;

const DELETE_INDEXED: &str = r#"
local removed = redis.call('DEL', KEYS[1])
redis.call('SREM', KEYS[2], ARGV[1])
return {tostring(removed)}
"#;

const REVOKE_INDEXED: &str = r#"
local keep = ARGV[2] or ''
local removed = 0
for _, member in ipairs(redis.call('SMEMBERS', KEYS[1])) do
  if member ~= keep then
    removed = removed + redis.call('DEL', ARGV[1] .. member)
    redis.call('SREM', KEYS[1], member)
  end
end
return {tostring(removed)}
"#;

const ROTATE_REFRESH: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return {'0'}
end
if current ~= ARGV[1] then
  return {'-1'}
end
redis.call('DEL', KEYS[1])
redis.call('SET', KEYS[2], ARGV[2], 'PX', ARGV[3])
redis.call('SREM', KEYS[3], ARGV[4])
redis.call('SADD', KEYS[3], ARGV[5])
local index_ttl = redis.call('PTTL', KEYS[3])
if index_ttl < tonumber(ARGV[6]) then
  redis.call('PEXPIRE', KEYS[3], ARGV[6])
end
if tonumber(ARGV[8]) > 0 then
  redis.call('SET', KEYS[4], ARGV[7], 'PX', ARGV[8])
end
return {'1'}
"#;
