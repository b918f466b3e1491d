//! 서비스 계층 모듈
//!
//! 리포지토리 위에서 동작하는 rate limit 엔진과 인증 서비스용 facade를 제공합니다.
//!
//! # Examples
//!
//! ```rust,ignore
//! use crate::services::trust_service::TrustLayer;
//!
//! let trust = TrustLayer::new(store, clock, keys, config)?;
//! let result = trust.throttle_login("198.51.100.7").await?;
//! ```

pub mod rate_limit;
pub mod trust_service;
