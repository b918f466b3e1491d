//! 에러 타입 모듈
//!
//! 모든 저장소/서비스가 공유하는 [`CacheError`]와 [`CacheResult`]를 제공합니다.

pub mod errors;

pub use errors::*;
