//! 인센드 신뢰 캐시 계층
//!
//! 인증 서비스가 Redis 위에 두는 단기 보안 상태를 담당합니다.
//!
//! # Features
//!
//! - **Rate limiting**: 고정 윈도우, 슬라이딩 윈도우, 토큰 버킷 (모두 단일 원자 스크립트)
//! - **OTP**: 해시 저장, 상수 시간 비교, 시도 횟수 상한
//! - **JTI denylist**: access token 즉시 무효화
//! - **Refresh token**: 원자적 회전과 재사용 감지, 사용자별 상한과 일괄 폐기
//! - **Session**: 생성, 갱신, 회전, 사용자별 폐기
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   TrustLayer    │ ← 인증 서비스 진입점
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Repositories   │ ← OTP / JTI / Refresh token / Session / Rate limit
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  KeyValueStore  │ ← RedisStore (운영) / MemoryStore (테스트)
//! └─────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use auth_trust_cache::caching::{KeyValueStore, RedisStore};
//! use auth_trust_cache::config::{RedisConfig, TrustCacheConfig};
//! use auth_trust_cache::core::SystemClock;
//! use auth_trust_cache::services::trust_service::TrustLayer;
//! use auth_trust_cache::utils::key_utils::KeySpace;
//!
//! let redis = RedisConfig::from_env();
//! let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&redis).await?);
//! let trust = TrustLayer::new(store, Arc::new(SystemClock), KeySpace::new(redis.key_builder()), TrustCacheConfig::from_env())?;
//! ```

pub mod core;
pub mod config;
pub mod caching;
pub mod domain;
pub mod repositories;
pub mod services;
pub mod utils;
pub mod errors;
