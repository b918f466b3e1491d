use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::caching::codec::{encode, load_json};
use crate::caching::{AtomicScript, KeyValueStore};
use crate::config::TrustCacheConfig;
use crate::core::Clock;
use crate::domain::models::SessionRecord;
use crate::errors::{CacheError, CacheResult};
use crate::utils::key_utils::KeySpace;
use crate::utils::string_utils::{clean_client_meta, validate_required_string};
use crate::utils::time_utils::{Ttl, expires_at_ms};

/// 세션 생성 옵션
#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
    /// 없으면 설정 기본값 (7일)
    pub ttl: Option<Ttl>,
    pub ip: Option<String>,
    pub ua: Option<String>,
    pub meta: Option<Value>,
}

/// 서버 측 세션 리포지토리
///
/// `session:<sid>`에 레코드를, `user:<uid>:sessions`에 사용자별 sid 집합을 둡니다.
/// 색인의 TTL은 `max(세션 TTL, session_index_min_ttl)` 이상으로 유지되고 줄어들지 않습니다.
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    default_ttl: Ttl,
    index_min_ttl: Ttl,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, keys: KeySpace, config: &TrustCacheConfig) -> Self {
        Self {
            store,
            clock,
            keys,
            default_ttl: config.session_ttl,
            index_min_ttl: config.session_index_min_ttl,
        }
    }

    fn resolve_ttl(&self, ttl: Option<Ttl>) -> CacheResult<Ttl> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::ValidationError("session TTL must be positive".to_string()));
        }
        Ok(ttl)
    }

    /// 레코드와 색인을 함께 기록합니다.
    ///
    /// `only_existing`이면 레코드 키가 이미 있을 때만 덮어씁니다. 그 사이에 폐기된
    /// 세션은 되살리지 않고 `false`를 돌려줍니다.
    async fn put(&self, record: &SessionRecord, ttl: Ttl, only_existing: bool) -> CacheResult<bool> {
        let reply = self
            .store
            .eval(
                AtomicScript::PutIndexed,
                &[self.keys.session(&record.sid), self.keys.user_sessions(&record.uid)],
                &[
                    encode(record)?,
                    ttl.millis().to_string(),
                    record.sid.clone(),
                    self.index_min_ttl.millis().to_string(),
                    if only_existing { "1" } else { "0" }.to_string(),
                ],
            )
            .await?;
        Ok(reply.int(0)? == 1)
    }

    async fn remove(&self, record: &SessionRecord) -> CacheResult<bool> {
        let reply = self
            .store
            .eval(
                AtomicScript::DeleteIndexed,
                &[self.keys.session(&record.sid), self.keys.user_sessions(&record.uid)],
                &[record.sid.clone()],
            )
            .await?;
        Ok(reply.int(0)? == 1)
    }

    /// 새 세션을 생성합니다.
    ///
    /// # Arguments
    ///
    /// * `uid` - 세션 소유자
    /// * `options` - TTL과 클라이언트 메타데이터 (IP, User-Agent는 512자로 잘림)
    ///
    /// # Errors
    ///
    /// * `CacheError::ValidationError` - 빈 사용자 ID 또는 0 TTL
    pub async fn create(&self, uid: &str, options: CreateSessionOptions) -> CacheResult<SessionRecord> {
        let uid = validate_required_string(uid, "uid")?;
        let ttl = self.resolve_ttl(options.ttl)?;
        let now = self.clock.now_ms();

        let record = SessionRecord {
            sid: Uuid::new_v4().to_string(),
            uid,
            issued_at: now,
            expires_at: expires_at_ms(now, ttl),
            ip: clean_client_meta(options.ip),
            ua: clean_client_meta(options.ua),
            meta: options.meta,
        };
        self.put(&record, ttl, false).await?;

        info!("세션 생성: {} (user {}, ttl {})", record.sid, record.uid, ttl);
        Ok(record)
    }

    /// 세션을 조회합니다. 만료된 레코드는 삭제하고 `None`.
    pub async fn get(&self, sid: &str) -> CacheResult<Option<SessionRecord>> {
        let sid = validate_required_string(sid, "sid")?;
        let key = self.keys.session(&sid);
        let Some(record) = load_json::<SessionRecord>(self.store.as_ref(), &key, "session").await? else {
            return Ok(None);
        };

        if record.is_expired(self.clock.now_ms()) {
            debug!("만료된 세션 삭제: {}", record.sid);
            self.remove(&record).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// 만료 시각을 `now + ttl`로 다시 계산합니다. 남은 시간에 더하지 않습니다.
    ///
    /// 세션이 없거나 읽은 뒤 폐기되었으면 `None`.
    pub async fn touch(&self, sid: &str, ttl: Option<Ttl>) -> CacheResult<Option<SessionRecord>> {
        let ttl = self.resolve_ttl(ttl)?;
        let Some(mut record) = self.get(sid).await? else {
            return Ok(None);
        };

        record.expires_at = expires_at_ms(self.clock.now_ms(), ttl);
        if !self.put(&record, ttl, true).await? {
            debug!("touch 중 폐기된 세션: {}", record.sid);
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// 같은 사용자/메타데이터로 새 sid를 발급하고 이전 sid를 삭제합니다 (세션 고정 방지).
    ///
    /// 새 레코드를 먼저 기록한 뒤 이전 레코드를 지우므로 중간에 실패해도 세션이 사라지지 않습니다.
    /// 이전 레코드가 그 사이에 폐기되었으면 새 레코드도 지우고 `None`.
    pub async fn rotate(&self, sid: &str, ttl: Option<Ttl>) -> CacheResult<Option<SessionRecord>> {
        let ttl = self.resolve_ttl(ttl)?;
        let Some(old) = self.get(sid).await? else {
            return Ok(None);
        };

        let now = self.clock.now_ms();
        let rotated = SessionRecord {
            sid: Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: expires_at_ms(now, ttl),
            ..old.clone()
        };
        self.put(&rotated, ttl, false).await?;
        if !self.remove(&old).await? {
            warn!("회전 중 폐기된 세션: {}, 새 sid {} 취소", old.sid, rotated.sid);
            self.remove(&rotated).await?;
            return Ok(None);
        }

        info!("세션 회전: {} -> {} (user {})", old.sid, rotated.sid, rotated.uid);
        Ok(Some(rotated))
    }

    /// 세션을 삭제합니다. 삭제된 레코드가 있었으면 `true`.
    pub async fn delete(&self, sid: &str) -> CacheResult<bool> {
        let sid = validate_required_string(sid, "sid")?;
        let key = self.keys.session(&sid);
        match load_json::<SessionRecord>(self.store.as_ref(), &key, "session").await? {
            Some(record) => self.remove(&record).await,
            None => Ok(false),
        }
    }

    /// 사용자 색인에 있는 sid 목록 (고아 항목 포함 가능)
    pub async fn list_user_session_ids(&self, uid: &str) -> CacheResult<Vec<String>> {
        let uid = validate_required_string(uid, "uid")?;
        let mut ids = self.store.smembers(&self.keys.user_sessions(&uid)).await?;
        ids.sort();
        Ok(ids)
    }

    /// 사용자의 살아 있는 세션을 최신순으로 반환하고 고아 색인 항목을 정리합니다.
    pub async fn list_user_sessions(&self, uid: &str) -> CacheResult<Vec<SessionRecord>> {
        let uid = validate_required_string(uid, "uid")?;
        let index_key = self.keys.user_sessions(&uid);

        let mut live = Vec::new();
        let mut orphans = Vec::new();
        for sid in self.store.smembers(&index_key).await? {
            match self.get(&sid).await? {
                Some(record) => live.push(record),
                None => orphans.push(sid),
            }
        }

        if !orphans.is_empty() {
            warn!("사용자 {}의 고아 세션 색인 {}개 정리", uid, orphans.len());
            self.store.srem(&index_key, &orphans).await?;
        }

        live.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then_with(|| a.sid.cmp(&b.sid)));
        Ok(live)
    }

    /// 사용자의 세션을 모두 삭제합니다. `except_sid`는 남깁니다.
    ///
    /// 색인 읽기와 삭제가 한 스크립트에서 실행되므로, 도중에 생성된 세션이
    /// 색인에서만 빠진 채 남는 일이 없습니다.
    ///
    /// # Returns
    ///
    /// 실제로 삭제된 세션 레코드 수
    pub async fn revoke_user(&self, uid: &str, except_sid: Option<&str>) -> CacheResult<u64> {
        let uid = validate_required_string(uid, "uid")?;
        let reply = self
            .store
            .eval(
                AtomicScript::RevokeIndexed,
                &[self.keys.user_sessions(&uid)],
                &[self.keys.session_prefix(), except_sid.unwrap_or_default().to_string()],
            )
            .await?;
        let removed = u64::try_from(reply.int(0)?).unwrap_or(0);

        if removed > 0 {
            info!("사용자 {}의 세션 {}개 폐기", uid, removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::testing::RacingStore;
    use crate::caching::{KeyTtl, MemoryStore};
    use crate::core::ManualClock;

    const START: i64 = 1_700_000_000_000;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// 세션 하나를 만든 뒤, 다음 기록 직전에 사용자 세션 전체가 폐기되는 저장소
    async fn revoked_before_write() -> (Arc<MemoryStore>, SessionRepository, SessionRecord) {
        let (clock, inner, plain) = repo();
        let created = plain.create("u1", CreateSessionOptions::default()).await.unwrap();

        let racing = RacingStore::new(inner.clone()).before(
            AtomicScript::PutIndexed,
            AtomicScript::RevokeIndexed,
            strings(&["user:u1:sessions"]),
            strings(&["session:"]),
        );
        let sessions = SessionRepository::new(Arc::new(racing), clock, KeySpace::default(), &TrustCacheConfig::default());
        (inner, sessions, created)
    }

    fn repo() -> (Arc<ManualClock>, Arc<MemoryStore>, SessionRepository) {
        let clock = Arc::new(ManualClock::new(START));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let repo = SessionRepository::new(store.clone(), clock.clone(), KeySpace::default(), &TrustCacheConfig::default());
        (clock, store, repo)
    }

    fn with_ttl(ttl: Ttl) -> CreateSessionOptions {
        CreateSessionOptions { ttl: Some(ttl), ..Default::default() }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, store, sessions) = repo();
        let options = CreateSessionOptions {
            ip: Some(" 10.0.0.1 ".into()),
            ua: Some("x".repeat(600)),
            ..Default::default()
        };
        let created = sessions.create("u1", options).await.unwrap();
        assert_eq!(created.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(created.ua.as_ref().map(|ua| ua.chars().count()), Some(512));
        assert_eq!(created.expires_at, START + Ttl::from_days(7).millis() as i64);

        assert_eq!(sessions.get(&created.sid).await.unwrap(), Some(created.clone()));
        assert_eq!(
            store.pttl("user:u1:sessions").await.unwrap(),
            KeyTtl::Expires(Ttl::from_days(7))
        );
    }

    #[tokio::test]
    async fn test_short_session_keeps_index_for_a_day() {
        let (_, store, sessions) = repo();
        sessions.create("u1", with_ttl(Ttl::from_mins(10))).await.unwrap();
        assert_eq!(
            store.pttl("user:u1:sessions").await.unwrap(),
            KeyTtl::Expires(Ttl::from_days(1))
        );
    }

    #[tokio::test]
    async fn test_touch_recomputes_expiry() {
        let (clock, store, sessions) = repo();
        let created = sessions.create("u1", with_ttl(Ttl::from_hours(1))).await.unwrap();

        clock.advance(Ttl::from_mins(30));
        let touched = sessions.touch(&created.sid, Some(Ttl::from_hours(1))).await.unwrap().unwrap();
        assert_eq!(touched.expires_at, START + Ttl::from_mins(90).millis() as i64);
        assert_eq!(
            store.pttl(&format!("session:{}", created.sid)).await.unwrap(),
            KeyTtl::Expires(Ttl::from_hours(1))
        );

        // 더 짧은 TTL로 touch하면 만료가 앞당겨짐
        let shorter = sessions.touch(&created.sid, Some(Ttl::from_mins(5))).await.unwrap().unwrap();
        assert_eq!(shorter.expires_at, START + Ttl::from_mins(35).millis() as i64);

        assert!(sessions.touch("missing", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_does_not_resurrect_revoked_session() {
        let (inner, sessions, created) = revoked_before_write().await;

        assert!(sessions.touch(&created.sid, None).await.unwrap().is_none());
        assert!(sessions.get(&created.sid).await.unwrap().is_none());
        assert!(!inner.exists("user:u1:sessions").await.unwrap());
        assert_eq!(inner.key_count(), 0);
    }

    #[tokio::test]
    async fn test_rotate_does_not_resurrect_revoked_session() {
        let (inner, sessions, created) = revoked_before_write().await;

        assert!(sessions.rotate(&created.sid, None).await.unwrap().is_none());
        assert!(sessions.list_user_session_ids("u1").await.unwrap().is_empty());
        assert_eq!(inner.key_count(), 0);
    }

    #[tokio::test]
    async fn test_rotate_replaces_sid() {
        let (_, _, sessions) = repo();
        let options = CreateSessionOptions {
            ip: Some("10.0.0.1".into()),
            meta: Some(serde_json::json!({"device": "ios"})),
            ..Default::default()
        };
        let old = sessions.create("u1", options).await.unwrap();
        let rotated = sessions.rotate(&old.sid, None).await.unwrap().unwrap();

        assert_ne!(rotated.sid, old.sid);
        assert_eq!(rotated.uid, "u1");
        assert_eq!(rotated.ip, old.ip);
        assert_eq!(rotated.meta, old.meta);
        assert!(sessions.get(&old.sid).await.unwrap().is_none());
        assert_eq!(sessions.list_user_session_ids("u1").await.unwrap(), vec![rotated.sid.clone()]);
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_on_read() {
        let (clock, store, sessions) = repo();
        let created = sessions.create("u1", with_ttl(Ttl::from_secs(30))).await.unwrap();
        clock.advance(Ttl::from_secs(30));

        assert!(sessions.get(&created.sid).await.unwrap().is_none());
        assert!(sessions.list_user_sessions("u1").await.unwrap().is_empty());
        assert!(store.smembers("user:u1:sessions").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_revoke_user() {
        let (clock, _, sessions) = repo();
        let a = sessions.create("u1", CreateSessionOptions::default()).await.unwrap();
        clock.advance(Ttl::from_secs(1));
        let b = sessions.create("u1", CreateSessionOptions::default()).await.unwrap();
        clock.advance(Ttl::from_secs(1));
        let c = sessions.create("u1", CreateSessionOptions::default()).await.unwrap();

        let listed: Vec<_> = sessions
            .list_user_sessions("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.sid)
            .collect();
        assert_eq!(listed, vec![c.sid.clone(), b.sid.clone(), a.sid.clone()]);

        assert!(sessions.delete(&a.sid).await.unwrap());
        assert!(!sessions.delete(&a.sid).await.unwrap());

        assert_eq!(sessions.revoke_user("u1", Some(&c.sid)).await.unwrap(), 1);
        assert!(sessions.get(&b.sid).await.unwrap().is_none());
        assert_eq!(sessions.list_user_session_ids("u1").await.unwrap(), vec![c.sid.clone()]);

        assert_eq!(sessions.revoke_user("u1", None).await.unwrap(), 1);
        assert!(sessions.list_user_session_ids("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_user_leaves_no_unindexed_session() {
        let clock = Arc::new(ManualClock::new(START));
        let inner = Arc::new(MemoryStore::new(clock.clone()));
        // 일괄 폐기 직전에 다른 요청이 세션을 생성
        let racing = RacingStore::new(inner.clone()).before(
            AtomicScript::RevokeIndexed,
            AtomicScript::PutIndexed,
            strings(&["session:late", "user:u1:sessions"]),
            strings(&["{}", "60000", "late", "86400000", "0"]),
        );
        let sessions = SessionRepository::new(Arc::new(racing), clock, KeySpace::default(), &TrustCacheConfig::default());
        sessions.create("u1", CreateSessionOptions::default()).await.unwrap();

        assert_eq!(sessions.revoke_user("u1", None).await.unwrap(), 2);
        assert!(!inner.exists("session:late").await.unwrap());
        assert_eq!(inner.key_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let (_, _, sessions) = repo();
        assert!(sessions.create("", CreateSessionOptions::default()).await.is_err());
        assert!(sessions.create("u1", with_ttl(Ttl::ZERO)).await.is_err());
        assert!(sessions.get(" ").await.is_err());
    }
}
