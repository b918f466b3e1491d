//! 공통 유틸리티 함수 모듈
//!
//! 저장소 계층 전체에서 사용되는 시간, 키, 해시, 문자열 유틸리티를 제공합니다.
//!
//! # Modules
//!
//! - [`time_utils`] - `Ttl` 타입, 기간 파싱/포맷, 단위 변환
//! - [`key_utils`] - 키 조립, 정규화, 고정 키 패밀리(`KeySpace`)
//! - [`hash_utils`] - SHA-256/HMAC, 상수 시간 비교, 지문, 랜덤 토큰
//! - [`string_utils`] - 입력 문자열 검증과 정리
//! - [`display_terminal`] - 바이너리 시작 시 터미널 출력
//!
//! # Examples
//!
//! ```rust,ignore
//! use crate::utils::time_utils::Ttl;
//! use crate::utils::hash_utils::fingerprint_token;
//!
//! let ttl = Ttl::parse("15m");
//! let key = keys.refresh_token(&fingerprint_token(&token));
//! ```

pub mod display_terminal;
pub mod hash_utils;
pub mod key_utils;
pub mod string_utils;
pub mod time_utils;
