//! 신뢰 캐시 기본값 설정 모듈
//!
//! 레코드 종류별 기본 TTL과 시도/보유 한도를 관리합니다.
//! 전역 상태로 두지 않고, 시작 시 한 번 읽어서 각 리포지토리에 전달합니다.

use std::env;
use std::str::FromStr;

use log::warn;

use crate::utils::string_utils::clean_optional_string;
use crate::utils::time_utils::{DurationUnit, Ttl, parse_duration};

/// 프로세스 환경 변수 조회
pub(crate) fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// 기간 설정값을 읽습니다.
///
/// `"2h30m"` 형식을 받으며, 단위 없는 숫자는 초로 해석합니다.
/// 값이 없으면 기본값, 해석할 수 없거나 0이면 경고 후 기본값을 사용합니다.
pub(crate) fn duration_setting<F>(lookup: &F, name: &str, default: Ttl) -> Ttl
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = clean_optional_string(lookup(name)) else {
        return default;
    };
    let ttl = parse_duration(raw.as_str(), DurationUnit::Seconds);
    if ttl.is_zero() {
        warn!("{} 값 '{}'을(를) 해석할 수 없습니다. 기본값 {} 사용", name, raw, default);
        return default;
    }
    ttl
}

/// 양의 정수 설정값을 읽습니다. 해석할 수 없거나 0이면 경고 후 기본값을 사용합니다.
pub(crate) fn count_setting<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = clean_optional_string(lookup(name)) else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!("{} 값 '{}'이(가) 올바르지 않습니다. 기본값 {} 사용", name, raw, default);
            default
        }
    }
}

/// 신뢰 캐시 계층 설정
///
/// # Environment Variables
///
/// | 변수 | 기본값 |
/// |------|--------|
/// | `SESSION_TTL` | 7d |
/// | `REFRESH_TOKEN_TTL` | 30d |
/// | `OTP_TTL` | 5m |
/// | `RATE_LIMIT_WINDOW` | 60s |
/// | `RATE_LIMIT_MAX` | 5 |
/// | `OTP_MAX_ATTEMPTS` | 5 |
/// | `REFRESH_TOKEN_MAX_PER_USER` | 10 |
/// | `SESSION_INDEX_MIN_TTL` | 1d |
///
/// # Examples
///
/// ```rust,ignore
/// let config = TrustCacheConfig::from_env();
/// let sessions = SessionRepository::new(store.clone(), clock.clone(), keys.clone(), &config);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrustCacheConfig {
    pub session_ttl: Ttl,
    pub refresh_token_ttl: Ttl,
    pub otp_ttl: Ttl,
    pub rate_limit_window: Ttl,
    pub rate_limit_max: u64,
    pub otp_max_attempts: u32,
    pub refresh_token_max_per_user: usize,
    pub session_index_min_ttl: Ttl,
}

impl Default for TrustCacheConfig {
    fn default() -> Self {
        Self {
            session_ttl: Ttl::from_days(7),
            refresh_token_ttl: Ttl::from_days(30),
            otp_ttl: Ttl::from_mins(5),
            rate_limit_window: Ttl::from_secs(60),
            rate_limit_max: 5,
            otp_max_attempts: 5,
            refresh_token_max_per_user: 10,
            session_index_min_ttl: Ttl::from_days(1),
        }
    }
}

impl TrustCacheConfig {
    pub fn from_env() -> Self {
        Self::from_source(env_lookup)
    }

    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            session_ttl: duration_setting(&lookup, "SESSION_TTL", d.session_ttl),
            refresh_token_ttl: duration_setting(&lookup, "REFRESH_TOKEN_TTL", d.refresh_token_ttl),
            otp_ttl: duration_setting(&lookup, "OTP_TTL", d.otp_ttl),
            rate_limit_window: duration_setting(&lookup, "RATE_LIMIT_WINDOW", d.rate_limit_window),
            rate_limit_max: count_setting(&lookup, "RATE_LIMIT_MAX", d.rate_limit_max),
            otp_max_attempts: count_setting(&lookup, "OTP_MAX_ATTEMPTS", d.otp_max_attempts),
            refresh_token_max_per_user: count_setting(
                &lookup,
                "REFRESH_TOKEN_MAX_PER_USER",
                d.refresh_token_max_per_user,
            ),
            session_index_min_ttl: duration_setting(&lookup, "SESSION_INDEX_MIN_TTL", d.session_index_min_ttl),
        }
    }
}
