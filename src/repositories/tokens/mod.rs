//! Refresh token 리포지토리 모듈
//!
//! 불투명 refresh token의 발급, 검증, 회전, 폐기를 담당합니다.
//!
//! # Features
//!
//! - **해시 저장**: 토큰 원문 대신 `sha256hex(token)`만 저장
//! - **원자적 회전**: compare-and-swap으로 이전 토큰을 지우고 후속 토큰을 설치
//! - **재사용 감지**: 회전된 토큰이 다시 제시되면 `ReuseDetected`
//! - **사용자 색인**: 사용자별 일괄 폐기와 보유 개수 상한
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::repositories::tokens::{RefreshTokenRepository, IssueRefreshOptions};
//!
//! let issued = refresh_repo.issue("user123", IssueRefreshOptions::default()).await?;
//! let next = refresh_repo.rotate(&issued.token, None).await?;
//! ```

pub mod refresh_token_repository;

pub use refresh_token_repository::*;
