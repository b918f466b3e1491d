//! JWT ID 차단 목록
//!
//! 로그아웃이나 탈취 의심 시 특정 access token을 자연 만료 전에 무효화합니다.
//!
//! ```rust,ignore
//! use crate::repositories::jti::{JtiRepository, BlockJtiOptions};
//!
//! jti_repo.block_until(&claims.jti, claims.exp, BlockJtiOptions::default()).await?;
//! if jti_repo.is_blocked_or_fail_closed(&claims.jti).await {
//!     // 거부
//! }
//! ```

pub mod jti_repository;

pub use jti_repository::*;
