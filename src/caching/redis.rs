//! # Redis 저장소 구현
//!
//! [`KeyValueStore`]를 Redis 위에 구현합니다. 드라이버 API는 이 파일에서만
//! 다루며, 리포지토리와 서비스는 trait만 봅니다.
//!
//! ## 연결 관리
//!
//! `ConnectionManager`는 멀티플렉싱된 단일 연결을 공유하고, 끊기면 자동으로
//! 재연결합니다. 각 명령은 매니저를 clone 해서 사용합니다 (clone은 핸들 복사).
//!
//! ## 스크립트
//!
//! [`AtomicScript`]의 Lua 소스는 처음 사용할 때 `redis::Script`로 한 번만 만들어지며,
//! 실행은 `EVALSHA` 후 `NOSCRIPT`면 `EVAL`로 재시도하는 드라이버 기본 동작을 따릅니다.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use crate::caching::scripts::AtomicScript;
use crate::caching::store::{KeyTtl, KeyValueStore, ScriptReply, ensure_positive_ttl};
use crate::config::RedisConfig;
use crate::errors::{CacheError, CacheResult};
use crate::utils::time_utils::Ttl;

static SCRIPTS: Lazy<HashMap<AtomicScript, Script>> = Lazy::new(|| {
    AtomicScript::ALL
        .iter()
        .map(|script| (*script, Script::new(script.lua())))
        .collect()
});

/// Redis 기반 [`KeyValueStore`]
///
/// ## 사용 예제
///
/// ```rust,ignore
/// let config = RedisConfig::from_env();
/// let store = RedisStore::connect(&config).await?;
/// store.ping().await?;
///
/// let store: Arc<dyn KeyValueStore> = Arc::new(store);
/// ```
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Redis 서버에 연결합니다.
    ///
    /// `connect_timeout` 안에 연결이 수립되지 않으면 `StoreUnavailable`을 반환합니다.
    ///
    /// # Arguments
    ///
    /// * `config` - 접속 URL과 연결 타임아웃
    ///
    /// # Errors
    ///
    /// * `CacheError::StoreUnavailable` - 잘못된 URL, 연결 실패, 타임아웃
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;

        let manager = tokio::time::timeout(config.connect_timeout.as_std(), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                CacheError::StoreUnavailable(format!(
                    "Redis 연결 타임아웃 ({})",
                    config.connect_timeout
                ))
            })??;

        info!("✅ Redis 연결 성공: {}", config.redacted_url());

        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Ttl>) -> CacheResult<()> {
        ensure_positive_ttl(key, ttl)?;

        let mut conn = self.conn();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.millis());
        }
        cmd.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn pexpire(&self, key: &str, ttl: Ttl) -> CacheResult<bool> {
        let mut conn = self.conn();
        let applied: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl.millis())
            .query_async(&mut conn)
            .await?;
        Ok(applied)
    }

    async fn pttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let mut conn = self.conn();
        let raw: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(KeyTtl::from_pttl(raw))
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn();
        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.conn();
        let added: i64 = redis::cmd("SADD").arg(key).arg(member).query_async(&mut conn).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let removed: u64 = redis::cmd("SREM").arg(key).arg(members).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn();
        let members: Vec<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await?;
        Ok(members)
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

        let lua = SCRIPTS
            .get(&script)
            .ok_or_else(|| CacheError::InternalError(format!("script {} is not registered", script.name())))?;

        let mut invocation = lua.prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg);
        }

        let mut conn = self.conn();
        let reply: Vec<String> = invocation.invoke_async(&mut conn).await.map_err(|e| {
            warn!("Redis 스크립트 실행 실패 ({}): {}", script.name(), e);
            CacheError::from(e)
        })?;

        debug!("스크립트 {} 응답: {:?}", script.name(), reply);
        Ok(ScriptReply::new(reply))
    }
}
