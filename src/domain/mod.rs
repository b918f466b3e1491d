//! # Domain Layer Module
//!
//! 신뢰 캐시 계층의 도메인 타입을 담는 모듈입니다.
//!
//! ```text
//! Domain Layer (이 모듈)
//! └── Models       - 저장소 레코드 (OTP, JTI, Refresh Token, Session)
//!      │
//!      ▼
//! Repositories (OTP / JTI / Refresh Token / Session)
//!      │
//!      ▼
//! KeyValueStore (Redis)
//! ```
//!
//! 레코드는 저장소 밖으로 나갈 때도 평문 비밀(코드, 토큰)을 포함하지 않습니다.

pub mod models;

pub use models::*;
