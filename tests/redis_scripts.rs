//! 실제 Redis에서 원자 스크립트를 실행하는 통합 테스트
//!
//! Redis가 필요하므로 기본적으로 무시됩니다.
//!
//! ```bash
//! REDIS_URL=redis://localhost:6379 cargo test --test redis_scripts -- --ignored
//! ```

use std::sync::Arc;

use auth_trust_cache::caching::{KeyTtl, KeyValueStore, RedisStore};
use auth_trust_cache::config::{RedisConfig, TrustCacheConfig};
use auth_trust_cache::core::SystemClock;
use auth_trust_cache::errors::CacheError;
use auth_trust_cache::repositories::otp::{IssueOtpOptions, OtpVerification, VerifyOtpOptions};
use auth_trust_cache::repositories::sessions::CreateSessionOptions;
use auth_trust_cache::repositories::tokens::RefreshVerification;
use auth_trust_cache::services::rate_limit::RateLimitPolicy;
use auth_trust_cache::services::trust_service::TrustLayer;
use auth_trust_cache::utils::key_utils::KeySpace;
use auth_trust_cache::utils::time_utils::Ttl;

async fn setup() -> (Arc<dyn KeyValueStore>, TrustLayer) {
    let config = RedisConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        key_prefix: Some(format!("itest-{}", uuid::Uuid::new_v4())),
        ..Default::default()
    };
    let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&config).await.unwrap());
    let keys = KeySpace::new(config.key_builder());
    let trust = TrustLayer::new(store.clone(), Arc::new(SystemClock), keys, TrustCacheConfig::default()).unwrap();
    (store, trust)
}

#[tokio::test]
#[ignore]
async fn fixed_window_denies_sixth_call() {
    let (_, trust) = setup().await;
    let limiter = trust
        .limiter(&RateLimitPolicy::FixedWindow {
            prefix: "rl".into(),
            limit: 5,
            window: Ttl::from_secs(60),
        })
        .unwrap();

    for _ in 0..5 {
        assert!(limiter.take("u1").await.unwrap().allowed);
    }
    let sixth = limiter.take("u1").await.unwrap();
    assert!(!sixth.allowed);
    assert!(sixth.retry_in_ms > 0);
    limiter.reset("u1").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn sliding_window_and_token_bucket_run_on_redis() {
    let (_, trust) = setup().await;

    for _ in 0..5 {
        assert!(trust.throttle_login("198.51.100.7").await.unwrap().allowed);
    }
    assert!(!trust.throttle_login("198.51.100.7").await.unwrap().allowed);

    let bucket = trust
        .limiter(&RateLimitPolicy::TokenBucket {
            prefix: "tb".into(),
            capacity: 3,
            refill_per_sec: 0.5,
        })
        .unwrap();
    for _ in 0..3 {
        assert!(bucket.take("client").await.unwrap().allowed);
    }
    let denied = bucket.take("client").await.unwrap();
    assert!(!denied.allowed);
    assert!(denied.retry_in_ms > 0);
    bucket.reset("client").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn otp_mismatch_keeps_remaining_ttl() {
    let (_, trust) = setup().await;
    trust
        .otp
        .issue("u1", "482913", Some(Ttl::from_secs(300)), IssueOtpOptions::default())
        .await
        .unwrap();

    let wrong = trust.otp.verify("u1", "000000", VerifyOtpOptions::default()).await.unwrap();
    assert!(matches!(wrong, OtpVerification::Mismatch { attempts: 1, .. }));
    let ttl = trust.otp.ttl("u1", None).await.unwrap().unwrap();
    assert!(ttl <= Ttl::from_secs(300));

    assert!(trust.otp.verify("u1", "482913", VerifyOtpOptions::default()).await.unwrap().is_verified());
    assert!(!trust.otp.exists("u1", None).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn refresh_rotation_detects_reuse() {
    let (store, trust) = setup().await;
    let started = trust.start_session("u1", CreateSessionOptions::default()).await.unwrap();
    let next = trust.refresh(&started.refresh.token, None).await.unwrap();

    assert!(matches!(
        trust.refresh_tokens.verify(&started.refresh.token).await.unwrap(),
        RefreshVerification::Reused { .. }
    ));
    assert!(trust.refresh_tokens.verify(&next.token).await.unwrap().is_valid());

    let replay = trust.refresh(&started.refresh.token, None).await;
    assert!(matches!(replay, Err(CacheError::ReuseDetected { .. })));
    assert!(!trust.refresh_tokens.verify(&next.token).await.unwrap().is_valid());
    assert!(trust.sessions.list_user_session_ids("u1").await.unwrap().is_empty());

    assert_eq!(store.pttl("does-not-exist").await.unwrap(), KeyTtl::Missing);
}

#[tokio::test]
#[ignore]
async fn revoked_sessions_stay_revoked() {
    let (_, trust) = setup().await;
    let kept = trust.sessions.create("u1", CreateSessionOptions::default()).await.unwrap();
    let dropped = trust.sessions.create("u1", CreateSessionOptions::default()).await.unwrap();

    assert_eq!(trust.sessions.revoke_user("u1", Some(&kept.sid)).await.unwrap(), 1);
    assert!(trust.sessions.touch(&dropped.sid, None).await.unwrap().is_none());
    assert_eq!(trust.sessions.list_user_session_ids("u1").await.unwrap(), vec![kept.sid.clone()]);

    assert_eq!(trust.sessions.revoke_user("u1", None).await.unwrap(), 1);
    assert!(trust.sessions.get(&kept.sid).await.unwrap().is_none());
}
