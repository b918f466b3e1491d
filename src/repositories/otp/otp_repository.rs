use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;

use crate::caching::codec::{encode, load_json};
use crate::caching::{KeyTtl, KeyValueStore};
use crate::config::TrustCacheConfig;
use crate::core::{Clock, millis_to_datetime};
use crate::domain::models::OtpRecord;
use crate::errors::{CacheError, CacheResult};
use crate::utils::hash_utils::{constant_time_eq_str, sha256_hex};
use crate::utils::key_utils::KeySpace;
use crate::utils::string_utils::validate_required_string;
use crate::utils::time_utils::{Ttl, expires_at_ms};

/// OTP 발급 옵션
#[derive(Debug, Clone, Default)]
pub struct IssueOtpOptions {
    /// 같은 subject에 여러 용도의 코드를 둘 때 구분자 (`otp:<subject>:<kind>`)
    pub kind: Option<String>,
    pub meta: Option<Value>,
    /// 레코드에 기록되는 시도 상한
    pub max_attempts: Option<u32>,
}

/// OTP 검증 옵션
#[derive(Debug, Clone)]
pub struct VerifyOtpOptions {
    pub kind: Option<String>,
    /// 성공 시 레코드 삭제 (기본값 `true`)
    pub consume_on_success: bool,
    /// 이번 호출에만 적용되는 시도 상한. 레코드 값보다 우선합니다.
    pub max_attempts: Option<u32>,
}

impl Default for VerifyOtpOptions {
    fn default() -> Self {
        Self {
            kind: None,
            consume_on_success: true,
            max_attempts: None,
        }
    }
}

/// OTP 검증 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpVerification {
    /// 코드 일치
    Verified,
    /// 코드 불일치. 시도 횟수가 증가했습니다.
    Mismatch { attempts: u32, remaining_attempts: u32 },
    /// 시도 상한에 이미 도달. 비교하지 않았고 횟수도 늘리지 않았습니다.
    TooManyAttempts { attempts: u32 },
    /// 레코드 없음 (발급된 적 없음, 만료, 이미 사용됨)
    Missing,
}

impl OtpVerification {
    pub fn is_verified(&self) -> bool {
        matches!(self, OtpVerification::Verified)
    }
}

/// 일회용 코드(OTP) 리포지토리
///
/// 코드는 `sha256(code)`로만 저장되며 비교는 상수 시간으로 이루어집니다.
/// 실패한 검증은 남은 TTL을 그대로 유지한 채 시도 횟수만 올립니다.
///
/// ## 사용 예제
///
/// ```rust,ignore
/// let otp = OtpRepository::new(store.clone(), clock.clone(), keys.clone(), &config);
/// otp.issue("u1", "482913", None, IssueOtpOptions::default()).await?;
///
/// match otp.verify("u1", "482913", VerifyOtpOptions::default()).await? {
///     OtpVerification::Verified => { /* 로그인 진행 */ }
///     _ => { /* 실패 */ }
/// }
/// ```
pub struct OtpRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    default_ttl: Ttl,
    default_max_attempts: u32,
}

impl OtpRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, keys: KeySpace, config: &TrustCacheConfig) -> Self {
        Self {
            store,
            clock,
            keys,
            default_ttl: config.otp_ttl,
            default_max_attempts: config.otp_max_attempts,
        }
    }

    fn key(&self, subject: &str, kind: Option<&str>) -> CacheResult<String> {
        let subject = validate_required_string(subject, "subject")?;
        Ok(self.keys.otp(&subject, kind))
    }

    /// 코드를 발급(저장)합니다. 같은 키의 기존 코드는 덮어씁니다.
    ///
    /// # Arguments
    ///
    /// * `subject` - 코드 소유자 (사용자 ID, 이메일 등)
    /// * `code` - 평문 코드. 저장되지 않습니다.
    /// * `ttl` - 유효 기간. `None`이면 설정 기본값 (5분)
    ///
    /// # Returns
    ///
    /// 코드의 만료 시각
    ///
    /// # Errors
    ///
    /// * `CacheError::ValidationError` - 빈 subject/code 또는 0 TTL
    pub async fn issue(
        &self,
        subject: &str,
        code: &str,
        ttl: Option<Ttl>,
        options: IssueOtpOptions,
    ) -> CacheResult<DateTime<Utc>> {
        let key = self.key(subject, options.kind.as_deref())?;
        if code.is_empty() {
            return Err(CacheError::ValidationError("code은(는) 필수입니다".to_string()));
        }
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::ValidationError("OTP TTL must be positive".to_string()));
        }

        let now = self.clock.now_ms();
        let record = OtpRecord::new(sha256_hex(code), now, options.max_attempts, options.meta);
        self.store.set(&key, &encode(&record)?, Some(ttl)).await?;

        debug!("OTP 발급: {} (ttl {})", key, ttl);
        Ok(millis_to_datetime(expires_at_ms(now, ttl)))
    }

    /// 코드를 검증합니다.
    ///
    /// 시도 상한은 호출 옵션, 레코드 값, 설정 기본값 순으로 적용됩니다.
    /// 상한에 이미 도달했으면 비교 없이 `TooManyAttempts`를 돌려주며 횟수를 늘리지 않습니다.
    pub async fn verify(&self, subject: &str, code: &str, options: VerifyOtpOptions) -> CacheResult<OtpVerification> {
        let key = self.key(subject, options.kind.as_deref())?;
        let Some(mut record) = load_json::<OtpRecord>(self.store.as_ref(), &key, "OTP").await? else {
            return Ok(OtpVerification::Missing);
        };

        let cap = options
            .max_attempts
            .or(record.max_attempts)
            .unwrap_or(self.default_max_attempts);
        if record.attempts >= cap {
            warn!("OTP 시도 상한 초과: {} ({}/{})", key, record.attempts, cap);
            return Ok(OtpVerification::TooManyAttempts { attempts: record.attempts });
        }

        if constant_time_eq_str(&sha256_hex(code), &record.hash) {
            if options.consume_on_success {
                self.store.del(&[key.clone()]).await?;
            }
            info!("OTP 검증 성공: {}", key);
            return Ok(OtpVerification::Verified);
        }

        record.attempts = record.attempts.saturating_add(1);
        match self.store.pttl(&key).await? {
            KeyTtl::Expires(remaining) if !remaining.is_zero() => {
                self.store.set(&key, &encode(&record)?, Some(remaining)).await?;
            }
            KeyTtl::Persistent => {
                self.store.set(&key, &encode(&record)?, None).await?;
            }
            // 비교하는 사이에 만료됨
            _ => return Ok(OtpVerification::Missing),
        }

        debug!("OTP 불일치: {} ({}/{})", key, record.attempts, cap);
        Ok(OtpVerification::Mismatch {
            attempts: record.attempts,
            remaining_attempts: cap.saturating_sub(record.attempts),
        })
    }

    /// 코드를 폐기합니다. 삭제된 레코드가 있었으면 `true`.
    pub async fn invalidate(&self, subject: &str, kind: Option<&str>) -> CacheResult<bool> {
        let key = self.key(subject, kind)?;
        Ok(self.store.del(&[key]).await? > 0)
    }

    pub async fn exists(&self, subject: &str, kind: Option<&str>) -> CacheResult<bool> {
        let key = self.key(subject, kind)?;
        self.store.exists(&key).await
    }

    /// 남은 유효 기간. 레코드가 없으면 `None`.
    pub async fn ttl(&self, subject: &str, kind: Option<&str>) -> CacheResult<Option<Ttl>> {
        let key = self.key(subject, kind)?;
        Ok(self.store.pttl(&key).await?.remaining())
    }

    /// 레코드를 변경 없이 조회합니다 (해시와 시도 횟수).
    pub async fn peek(&self, subject: &str, kind: Option<&str>) -> CacheResult<Option<OtpRecord>> {
        let key = self.key(subject, kind)?;
        load_json(self.store.as_ref(), &key, "OTP").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::MemoryStore;
    use crate::core::ManualClock;

    fn repo() -> (Arc<ManualClock>, Arc<MemoryStore>, OtpRepository) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let repo = OtpRepository::new(store.clone(), clock.clone(), KeySpace::default(), &TrustCacheConfig::default());
        (clock, store, repo)
    }

    #[tokio::test]
    async fn test_wrong_then_right_code_scenario() {
        let (clock, _, otp) = repo();
        otp.issue("u1", "482913", Some(Ttl::from_secs(300)), IssueOtpOptions::default())
            .await
            .unwrap();

        clock.advance(Ttl::from_secs(10));
        let wrong = otp.verify("u1", "000000", VerifyOtpOptions::default()).await.unwrap();
        assert_eq!(wrong, OtpVerification::Mismatch { attempts: 1, remaining_attempts: 4 });
        assert_eq!(otp.peek("u1", None).await.unwrap().unwrap().attempts, 1);
        assert_eq!(otp.ttl("u1", None).await.unwrap(), Some(Ttl::from_secs(290)));

        let right = otp.verify("u1", "482913", VerifyOtpOptions::default()).await.unwrap();
        assert!(right.is_verified());
        assert!(!otp.exists("u1", None).await.unwrap());

        let again = otp.verify("u1", "482913", VerifyOtpOptions::default()).await.unwrap();
        assert_eq!(again, OtpVerification::Missing);
    }

    #[tokio::test]
    async fn test_plaintext_code_is_never_stored() {
        let (_, store, otp) = repo();
        otp.issue("u1", "482913", None, IssueOtpOptions::default()).await.unwrap();

        let raw = store.get("otp:u1").await.unwrap().unwrap();
        assert!(!raw.contains("482913"));
        assert!(raw.contains(&sha256_hex("482913")));
        assert_eq!(otp.ttl("u1", None).await.unwrap(), Some(Ttl::from_mins(5)));
    }

    #[tokio::test]
    async fn test_attempt_cap_blocks_without_incrementing() {
        let (_, _, otp) = repo();
        let issue = IssueOtpOptions { max_attempts: Some(2), ..Default::default() };
        otp.issue("u1", "111111", None, issue).await.unwrap();

        otp.verify("u1", "000000", VerifyOtpOptions::default()).await.unwrap();
        otp.verify("u1", "000000", VerifyOtpOptions::default()).await.unwrap();

        let blocked = otp.verify("u1", "111111", VerifyOtpOptions::default()).await.unwrap();
        assert_eq!(blocked, OtpVerification::TooManyAttempts { attempts: 2 });
        assert_eq!(otp.peek("u1", None).await.unwrap().unwrap().attempts, 2);
        assert!(otp.exists("u1", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_per_call_cap_overrides_record() {
        let (_, _, otp) = repo();
        otp.issue("u1", "111111", None, IssueOtpOptions::default()).await.unwrap();
        otp.verify("u1", "000000", VerifyOtpOptions::default()).await.unwrap();

        let strict = VerifyOtpOptions { max_attempts: Some(1), ..Default::default() };
        let result = otp.verify("u1", "111111", strict).await.unwrap();
        assert_eq!(result, OtpVerification::TooManyAttempts { attempts: 1 });
    }

    #[tokio::test]
    async fn test_keep_on_success_and_kinds_are_separate() {
        let (_, _, otp) = repo();
        let kind = IssueOtpOptions { kind: Some("email".into()), ..Default::default() };
        otp.issue("u1", "123456", None, kind).await.unwrap();
        assert!(!otp.exists("u1", None).await.unwrap());

        let keep = VerifyOtpOptions {
            kind: Some("email".into()),
            consume_on_success: false,
            ..Default::default()
        };
        assert!(otp.verify("u1", "123456", keep).await.unwrap().is_verified());
        assert!(otp.exists("u1", Some("email")).await.unwrap());

        assert!(otp.invalidate("u1", Some("email")).await.unwrap());
        assert!(!otp.invalidate("u1", Some("email")).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_code_is_missing() {
        let (clock, _, otp) = repo();
        otp.issue("u1", "123456", Some(Ttl::from_secs(30)), IssueOtpOptions::default())
            .await
            .unwrap();
        clock.advance(Ttl::from_secs(30));

        let result = otp.verify("u1", "123456", VerifyOtpOptions::default()).await.unwrap();
        assert_eq!(result, OtpVerification::Missing);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_treated_as_missing() {
        let (_, store, otp) = repo();
        store.set("otp:u1", "not-json", Some(Ttl::from_secs(60))).await.unwrap();

        let result = otp.verify("u1", "123456", VerifyOtpOptions::default()).await.unwrap();
        assert_eq!(result, OtpVerification::Missing);
        assert!(!store.exists("otp:u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_huge_ttl_saturates_expiry() {
        let (_, _, otp) = repo();
        let expires = otp
            .issue("u1", "123456", Some(Ttl::from_millis(u64::MAX)), IssueOtpOptions::default())
            .await
            .unwrap();

        assert_eq!(expires, DateTime::<Utc>::MAX_UTC);
        assert!(otp.exists("u1", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let (_, _, otp) = repo();
        assert!(otp.issue(" ", "1", None, IssueOtpOptions::default()).await.is_err());
        assert!(otp.issue("u1", "", None, IssueOtpOptions::default()).await.is_err());
        assert!(otp
            .issue("u1", "1", Some(Ttl::ZERO), IssueOtpOptions::default())
            .await
            .is_err());
    }
}
