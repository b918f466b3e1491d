//! 신뢰 캐시 계층 전역에서 사용하는 에러 시스템
//!
//! `thiserror`를 사용하여 타입 안전하고 일관된 에러 처리를 제공합니다.
//! HTTP 계층은 이 크레이트 밖에 있으므로, 호출자가 외부로 노출할 코드는
//! [`CacheError::public_code`]로 얻습니다.
//!
//! ## 에러 분류
//!
//! | CacheError | 외부 코드 | 의미 |
//! |------------|-----------|------|
//! | `NotFound` | `invalid_credentials` | 키 없음 (존재한 적 없음과 구분하지 않음) |
//! | `Expired` | `invalid_credentials` | 키는 있으나 만료됨 (내부적으로 정리 수행) |
//! | `ReuseDetected` | `token_reuse` | 이미 회전된 refresh token 재사용 |
//! | `StoreUnavailable` | `unavailable` | Redis 연결/타임아웃 |
//! | `Serialization` | `internal` | 레코드 직렬화 실패 |
//! | `ValidationError` | `invalid_request` | 잘못된 입력값 |
//! | `InternalError` | `internal` | 예상치 못한 오류 |
//!
//! Rate limit 초과는 에러가 아니라 `RateLimitResult { allowed: false, .. }` 입니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use crate::errors::{CacheError, CacheResult};
//!
//! async fn rotate(&self, token: &str) -> CacheResult<IssuedRefreshToken> {
//!     if token.is_empty() {
//!         return Err(CacheError::ValidationError("token is required".to_string()));
//!     }
//!     // ...
//! }
//! ```

use thiserror::Error;

/// 신뢰 캐시 계층 에러 타입
#[derive(Error, Debug)]
pub enum CacheError {
    /// 키가 존재하지 않음
    #[error("Not found: {0}")]
    NotFound(String),

    /// 레코드는 있으나 만료됨
    #[error("Expired: {0}")]
    Expired(String),

    /// 회전(rotate)된 refresh token이 다시 제시됨 - 토큰 탈취 의심
    #[error("Refresh token reuse detected for user {user_id}")]
    ReuseDetected {
        user_id: String,
        session_id: String,
    },

    /// 저장소 연결 실패 또는 타임아웃
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 입력값 검증 에러
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 내부 에러
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CacheError {
    /// 호출자가 외부로 노출해도 되는 에러 코드를 반환합니다.
    ///
    /// `NotFound`와 `Expired`는 같은 코드로 합쳐집니다.
    /// "존재하지 않음"과 "만료됨"을 구분해 주면 토큰 존재 여부에 대한
    /// 오라클이 되기 때문입니다.
    pub fn public_code(&self) -> &'static str {
        match self {
            CacheError::NotFound(_) | CacheError::Expired(_) => "invalid_credentials",
            CacheError::ReuseDetected { .. } => "token_reuse",
            CacheError::StoreUnavailable(_) => "unavailable",
            CacheError::ValidationError(_) => "invalid_request",
            CacheError::Serialization(_) | CacheError::InternalError(_) => "internal",
        }
    }

    /// 인증 실패로 취급해야 하는 에러인지 확인합니다.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound(_) | CacheError::Expired(_) | CacheError::ReuseDetected { .. }
        )
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

/// 편의성을 위한 Result 타입 별칭
pub type CacheResult<T> = Result<T, CacheError>;

/// 외부 라이브러리 에러를 CacheError로 변환하는 확장 trait
pub trait ErrorContext<T> {
    /// 컨텍스트 정보와 함께 에러를 변환합니다.
    fn context(self, msg: &str) -> CacheResult<T>;

    /// 클로저를 사용하여 지연 평가된 컨텍스트를 제공합니다.
    fn with_context<F>(self, f: F) -> CacheResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> CacheResult<T> {
        self.map_err(|e| CacheError::InternalError(format!("{}: {}", msg, e)))
    }

    fn with_context<F>(self, f: F) -> CacheResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| CacheError::InternalError(format!("{}: {}", f(), e)))
    }
}
