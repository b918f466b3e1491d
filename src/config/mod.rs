//! # Configuration Module
//!
//! 신뢰 캐시 계층의 설정 관리를 담당하는 모듈입니다.
//! 환경 변수 기반 설정값을 구조체로 읽어 들이며, 전역 상태 없이
//! 애플리케이션 시작 시 한 번 생성해 각 컴포넌트에 전달합니다.
//!
//! ## 모듈 구성
//!
//! - [`data_config`] - 실행 환경, Redis 연결 설정
//! - [`cache_config`] - 레코드별 기본 TTL, 시도/보유 한도
//!
//! ## 설계 원칙
//!
//! - 잘못된 값은 실행을 멈추지 않고 경고 로그와 함께 기본값으로 대체합니다.
//! - 기간 값은 `"2h30m"` 형식이며, 단위 없는 숫자는 항상 **초**입니다.
//! - `from_source`로 조회 함수를 주입하면 테스트에서 프로세스 환경을 건드리지 않습니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use crate::config::{Environment, RedisConfig, TrustCacheConfig};
//!
//! let env = Environment::current();
//! let redis = RedisConfig::from_env();
//! let cache = TrustCacheConfig::from_env();
//! println!("{:?} / session ttl {}", env, cache.session_ttl);
//! ```
//!
//! ## 환경 변수 설정 가이드
//!
//! ```bash
//! # 저장소
//! export REDIS_URL="redis://localhost:6379"
//! export REDIS_KEY_PREFIX="auth"
//! export REDIS_CONNECT_TIMEOUT="5s"
//!
//! # TTL 기본값
//! export SESSION_TTL="7d"
//! export REFRESH_TOKEN_TTL="30d"
//! export OTP_TTL="5m"
//! export RATE_LIMIT_WINDOW="60s"
//!
//! # 한도
//! export RATE_LIMIT_MAX="5"
//! export OTP_MAX_ATTEMPTS="5"
//! export REFRESH_TOKEN_MAX_PER_USER="10"
//! ```

pub mod cache_config;
pub mod data_config;

pub use cache_config::*;
pub use data_config::*;
