//! # Trust Layer
//!
//! 인증 서비스가 사용하는 단일 진입점입니다. 하나의 저장소/시계/설정 위에
//! 모든 리포지토리와 로그인 rate limiter를 묶습니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&redis_config).await?);
//! let trust = TrustLayer::new(store, Arc::new(SystemClock), keys, TrustCacheConfig::from_env())?;
//!
//! if !trust.throttle_login(&client_ip).await?.allowed {
//!     // 429
//! }
//! let started = trust.start_session("u1", CreateSessionOptions::default()).await?;
//! let next = trust.refresh(&started.refresh.token, None).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde_json::Value;

use crate::caching::KeyValueStore;
use crate::config::TrustCacheConfig;
use crate::core::Clock;
use crate::domain::models::SessionRecord;
use crate::errors::{CacheError, CacheResult};
use crate::repositories::jti::{BlockJtiOptions, JtiRepository, RevocationReason};
use crate::repositories::otp::OtpRepository;
use crate::repositories::sessions::{CreateSessionOptions, SessionRepository};
use crate::repositories::tokens::{IssueRefreshOptions, IssuedRefreshToken, RefreshTokenRepository};
use crate::services::rate_limit::{
    LimiterContext, RateLimit, RateLimitPolicy, RateLimitResult, SlidingWindowLimiter, build_limiter,
};
use crate::utils::key_utils::KeySpace;

/// 로그인 시도 rate limit 키 prefix
pub const LOGIN_RATE_LIMIT_PREFIX: &str = "rl:login";

/// 로그인 직후 발급되는 세션과 refresh token
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: SessionRecord,
    pub refresh: IssuedRefreshToken,
}

/// 로그아웃 대상. 주어진 항목만 폐기합니다.
#[derive(Debug, Clone, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    pub session_id: Option<String>,
    /// 현재 access token의 `jti`와 `exp`
    pub access_token: Option<(String, DateTime<Utc>)>,
    pub user_id: Option<String>,
}

/// 일괄 폐기 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevokedCounts {
    pub refresh_tokens: u64,
    pub sessions: u64,
}

pub struct TrustLayer {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    config: TrustCacheConfig,
    pub otp: OtpRepository,
    pub jti: JtiRepository,
    pub refresh_tokens: RefreshTokenRepository,
    pub sessions: SessionRepository,
    login_limiter: SlidingWindowLimiter,
}

impl TrustLayer {
    /// # Errors
    ///
    /// * `CacheError::ValidationError` - 로그인 rate limit 설정이 0
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        keys: KeySpace,
        config: TrustCacheConfig,
    ) -> CacheResult<Self> {
        let login_ctx = LimiterContext::new(store.clone(), clock.clone(), keys.clone(), LOGIN_RATE_LIMIT_PREFIX)?;
        let login_limiter = SlidingWindowLimiter::new(login_ctx, config.rate_limit_max, config.rate_limit_window)?;

        Ok(Self {
            otp: OtpRepository::new(store.clone(), clock.clone(), keys.clone(), &config),
            jti: JtiRepository::new(store.clone(), clock.clone(), keys.clone()),
            refresh_tokens: RefreshTokenRepository::new(store.clone(), clock.clone(), keys.clone(), &config),
            sessions: SessionRepository::new(store.clone(), clock.clone(), keys.clone(), &config),
            login_limiter,
            store,
            clock,
            keys,
            config,
        })
    }

    pub fn config(&self) -> &TrustCacheConfig {
        &self.config
    }

    /// 같은 저장소를 쓰는 추가 limiter를 만듭니다.
    pub fn limiter(&self, policy: &RateLimitPolicy) -> CacheResult<Box<dyn RateLimit>> {
        build_limiter(policy, self.store.clone(), self.clock.clone(), self.keys.clone())
    }

    /// 로그인 시도 하나를 기록하고 허용 여부를 반환합니다 (슬라이딩 윈도우).
    pub async fn throttle_login(&self, id: &str) -> CacheResult<RateLimitResult> {
        let result = self.login_limiter.take(id).await?;
        if !result.allowed {
            warn!("로그인 시도 제한: {} ({}ms 후 재시도)", id, result.retry_in_ms);
        }
        Ok(result)
    }

    /// 로그인 성공 후 세션을 만들고 같은 계보의 refresh token을 발급합니다.
    pub async fn start_session(&self, uid: &str, options: CreateSessionOptions) -> CacheResult<StartedSession> {
        let meta = options.meta.clone();
        let session = self.sessions.create(uid, options).await?;
        let refresh = self
            .refresh_tokens
            .issue(
                &session.uid,
                IssueRefreshOptions {
                    session_id: Some(session.sid.clone()),
                    meta,
                    ttl: None,
                },
            )
            .await?;

        Ok(StartedSession { session, refresh })
    }

    /// refresh token을 회전하고 연결된 세션의 만료를 갱신합니다.
    ///
    /// 재사용이 감지되면 해당 사용자의 모든 refresh token과 세션을 폐기한 뒤
    /// `CacheError::ReuseDetected`를 그대로 반환합니다.
    pub async fn refresh(&self, token: &str, meta: Option<Value>) -> CacheResult<IssuedRefreshToken> {
        match self.refresh_tokens.rotate(token, meta).await {
            Ok(issued) => {
                self.sessions.touch(&issued.session_id, None).await?;
                Ok(issued)
            }
            Err(CacheError::ReuseDetected { user_id, session_id }) => {
                error!("토큰 재사용 감지, 사용자 {}의 모든 자격 증명을 폐기합니다", user_id);
                self.revoke_everything(&user_id).await?;
                Err(CacheError::ReuseDetected { user_id, session_id })
            }
            Err(e) => Err(e),
        }
    }

    /// 요청에 포함된 자격 증명만 폐기합니다.
    pub async fn logout(&self, request: LogoutRequest) -> CacheResult<()> {
        if let Some(token) = request.refresh_token.as_deref() {
            self.refresh_tokens.revoke(token).await?;
        }
        if let Some(sid) = request.session_id.as_deref() {
            self.sessions.delete(sid).await?;
        }
        if let Some((jti, exp)) = request.access_token {
            let options = BlockJtiOptions {
                sub: request.user_id.clone(),
                reason: Some(RevocationReason::Logout),
                ..Default::default()
            };
            self.jti.block_until(&jti, exp, options).await?;
        }

        info!("로그아웃 처리 완료: {}", request.user_id.as_deref().unwrap_or("-"));
        Ok(())
    }

    /// 사용자의 모든 refresh token과 세션을 폐기합니다.
    pub async fn logout_everywhere(&self, user_id: &str) -> CacheResult<RevokedCounts> {
        self.revoke_everything(user_id).await
    }

    /// access token이 폐기되었는지 확인합니다. 저장소 오류 시 폐기된 것으로 봅니다.
    pub async fn is_access_revoked(&self, jti: &str) -> bool {
        self.jti.is_blocked_or_fail_closed(jti).await
    }

    async fn revoke_everything(&self, user_id: &str) -> CacheResult<RevokedCounts> {
        let counts = RevokedCounts {
            refresh_tokens: self.refresh_tokens.revoke_all_for_user(user_id).await?,
            sessions: self.sessions.revoke_user(user_id, None).await?,
        };
        info!(
            "사용자 {} 전체 폐기: refresh token {}개, 세션 {}개",
            user_id, counts.refresh_tokens, counts.sessions
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::MemoryStore;
    use crate::core::{ManualClock, millis_to_datetime};
    use crate::repositories::otp::{IssueOtpOptions, VerifyOtpOptions};
    use crate::repositories::tokens::RefreshVerification;
    use crate::utils::time_utils::Ttl;

    const START: i64 = 1_700_000_000_000;

    fn layer() -> (Arc<ManualClock>, TrustLayer) {
        let clock = Arc::new(ManualClock::new(START));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new(clock.clone()));
        let trust = TrustLayer::new(store, clock.clone(), KeySpace::default(), TrustCacheConfig::default()).unwrap();
        (clock, trust)
    }

    #[tokio::test]
    async fn test_login_throttle_uses_configured_window() {
        let (clock, trust) = layer();
        for _ in 0..5 {
            assert!(trust.throttle_login("198.51.100.7").await.unwrap().allowed);
        }
        let denied = trust.throttle_login("198.51.100.7").await.unwrap();
        assert!(!denied.allowed);
        assert!(trust.throttle_login("203.0.113.9").await.unwrap().allowed);

        clock.advance(Ttl::from_secs(60));
        assert!(trust.throttle_login("198.51.100.7").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_refresh_touches_linked_session() {
        let (clock, trust) = layer();
        let started = trust.start_session("u1", CreateSessionOptions::default()).await.unwrap();
        assert_eq!(started.refresh.session_id, started.session.sid);

        clock.advance(Ttl::from_days(1));
        let next = trust.refresh(&started.refresh.token, None).await.unwrap();
        assert_eq!(next.rotation, 1);

        let session = trust.sessions.get(&started.session.sid).await.unwrap().unwrap();
        assert_eq!(session.expires_at, START + Ttl::from_days(8).millis() as i64);
    }

    #[tokio::test]
    async fn test_reuse_revokes_everything_for_user() {
        let (_, trust) = layer();
        let started = trust.start_session("u1", CreateSessionOptions::default()).await.unwrap();
        let other = trust.start_session("u1", CreateSessionOptions::default()).await.unwrap();
        let next = trust.refresh(&started.refresh.token, None).await.unwrap();

        let replay = trust.refresh(&started.refresh.token, None).await;
        assert!(matches!(replay, Err(CacheError::ReuseDetected { .. })));

        assert!(!trust.refresh_tokens.verify(&next.token).await.unwrap().is_valid());
        assert!(!trust.refresh_tokens.verify(&other.refresh.token).await.unwrap().is_valid());
        assert!(trust.sessions.list_user_session_ids("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_revokes_given_credentials() {
        let (_, trust) = layer();
        let started = trust.start_session("u1", CreateSessionOptions::default()).await.unwrap();

        let request = LogoutRequest {
            refresh_token: Some(started.refresh.token.clone()),
            session_id: Some(started.session.sid.clone()),
            access_token: Some(("jti-1".to_string(), millis_to_datetime(START + 900_000))),
            user_id: Some("u1".into()),
        };
        trust.logout(request).await.unwrap();

        assert_eq!(
            trust.refresh_tokens.verify(&started.refresh.token).await.unwrap(),
            RefreshVerification::Missing
        );
        assert!(trust.sessions.get(&started.session.sid).await.unwrap().is_none());
        assert!(trust.is_access_revoked("jti-1").await);
        assert!(!trust.is_access_revoked("jti-2").await);
    }

    #[tokio::test]
    async fn test_logout_everywhere_counts() {
        let (_, trust) = layer();
        for _ in 0..2 {
            trust.start_session("u1", CreateSessionOptions::default()).await.unwrap();
        }
        let counts = trust.logout_everywhere("u1").await.unwrap();
        assert_eq!(counts, RevokedCounts { refresh_tokens: 2, sessions: 2 });
    }

    #[tokio::test]
    async fn test_shared_store_across_repositories() {
        let (_, trust) = layer();
        trust
            .otp
            .issue("u1", "482913", None, IssueOtpOptions::default())
            .await
            .unwrap();
        assert!(trust
            .otp
            .verify("u1", "482913", VerifyOtpOptions::default())
            .await
            .unwrap()
            .is_verified());

        let policy = RateLimitPolicy::FixedWindow {
            prefix: "rl:otp".into(),
            limit: 1,
            window: Ttl::from_secs(60),
        };
        let limiter = trust.limiter(&policy).unwrap();
        assert!(limiter.take("u1").await.unwrap().allowed);
        assert!(!limiter.take("u1").await.unwrap().allowed);
    }
}
