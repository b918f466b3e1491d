//! 캐싱 계층 모듈
//!
//! 신뢰 캐시 레코드가 저장되는 키-값 저장소 추상화와 그 구현들을 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`store`] - `KeyValueStore` trait, PTTL/스크립트 응답 타입
//! - [`scripts`] - 원자 연산 카탈로그 (Lua)
//! - [`redis`] - Redis 구현 (`ConnectionManager` 기반)
//! - [`memory`] - 인메모리 구현 (테스트, 로컬 실행)
//! - [`codec`] - JSON 레코드 직렬화와 손상 레코드 정리
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use crate::caching::{KeyValueStore, RedisStore};
//!
//! let store = RedisStore::connect(&RedisConfig::from_env()).await?;
//! store.set("jti:abc", "{}", Some(Ttl::from_mins(15))).await?;
//! ```
//!
//! # 환경 설정
//!
//! ```bash
//! REDIS_URL=redis://localhost:6379  # 기본값
//! REDIS_KEY_PREFIX=auth             # 선택
//! ```

pub mod codec;
pub mod memory;
pub mod redis;
pub mod scripts;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use scripts::AtomicScript;
pub use store::{KeyTtl, KeyValueStore, ScriptReply};
