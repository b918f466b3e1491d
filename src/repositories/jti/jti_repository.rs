use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde_json::Value;

use crate::caching::codec::{encode, peek_json};
use crate::caching::KeyValueStore;
use crate::core::Clock;
use crate::domain::models::JtiRecord;
use crate::errors::CacheResult;
use crate::utils::key_utils::KeySpace;
use crate::utils::string_utils::{clean_optional_string, validate_required_string};
use crate::utils::time_utils::{Ttl, remaining_until};

/// 차단 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationReason {
    /// 정상 로그아웃
    Logout,
    /// 관리자에 의한 강제 무효화
    AdminRevoked,
    /// 토큰 탈취 등 보안 사고
    SecurityBreach,
    /// 비밀번호 변경
    PasswordChanged,
    /// 계정 비활성화
    AccountDeactivated,
    Other(String),
}

impl RevocationReason {
    pub fn as_str(&self) -> &str {
        match self {
            RevocationReason::Logout => "logout",
            RevocationReason::AdminRevoked => "admin_revoked",
            RevocationReason::SecurityBreach => "security_breach",
            RevocationReason::PasswordChanged => "password_changed",
            RevocationReason::AccountDeactivated => "account_deactivated",
            RevocationReason::Other(reason) => reason,
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 차단 레코드에 남길 부가 정보
#[derive(Debug, Clone, Default)]
pub struct BlockJtiOptions {
    pub sub: Option<String>,
    pub aud: Option<String>,
    pub reason: Option<RevocationReason>,
    pub meta: Option<Value>,
}

/// JWT ID 차단 목록 (denylist)
///
/// 키가 존재하면 차단된 것이고, 키의 수명은 차단 대상 토큰의 남은 수명과 같습니다.
/// 이미 만료된 토큰은 서명 검증 단계에서 거부되므로 차단 항목을 만들지 않습니다.
///
/// 키가 없다는 것은 "차단된 적 없음"일 뿐이며 토큰의 정당성을 뜻하지 않습니다.
pub struct JtiRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
}

impl JtiRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, keys: KeySpace) -> Self {
        Self { store, clock, keys }
    }

    fn key(&self, jti: &str) -> CacheResult<String> {
        let jti = validate_required_string(jti, "jti")?;
        Ok(self.keys.jti(&jti))
    }

    /// JTI를 차단합니다.
    ///
    /// # Arguments
    ///
    /// * `jti` - 토큰의 `jti` 클레임
    /// * `ttl` - 토큰의 남은 유효 기간
    /// * `options` - 포렌식용 부가 정보 (`sub`, `aud`, 사유, 메타데이터)
    ///
    /// # Returns
    ///
    /// * `true` - 차단 레코드를 기록함
    /// * `false` - TTL이 0이라 기록하지 않음 (이미 만료된 토큰)
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let options = BlockJtiOptions {
    ///     sub: Some("u1".into()),
    ///     reason: Some(RevocationReason::Logout),
    ///     ..Default::default()
    /// };
    /// jti_repo.block("a3f1c9", Ttl::from_mins(15), options).await?;
    /// ```
    pub async fn block(&self, jti: &str, ttl: Ttl, options: BlockJtiOptions) -> CacheResult<bool> {
        let key = self.key(jti)?;
        if ttl.is_zero() {
            return Ok(false);
        }

        let record = JtiRecord {
            jti: jti.trim().to_string(),
            sub: clean_optional_string(options.sub),
            aud: clean_optional_string(options.aud),
            reason: options.reason.as_ref().map(|reason| reason.as_str().to_string()),
            created_at: self.clock.now_ms(),
            meta: options.meta,
        };
        self.store.set(&key, &encode(&record)?, Some(ttl)).await?;

        info!(
            "JTI 차단: {} (사유: {}, ttl: {})",
            record.jti,
            record.reason.as_deref().unwrap_or("-"),
            ttl
        );
        Ok(true)
    }

    /// 토큰의 `exp`(절대 만료 시각)까지 차단합니다.
    pub async fn block_until(&self, jti: &str, exp: DateTime<Utc>, options: BlockJtiOptions) -> CacheResult<bool> {
        let ttl = remaining_until(self.clock.now_ms(), exp.timestamp_millis());
        self.block(jti, ttl, options).await
    }

    /// 차단 여부 (순수 존재 확인)
    pub async fn is_blocked(&self, jti: &str) -> CacheResult<bool> {
        let key = self.key(jti)?;
        self.store.exists(&key).await
    }

    /// 차단 여부를 확인하되, 저장소에 닿을 수 없으면 차단된 것으로 간주합니다.
    ///
    /// 접근을 허용하는 경로에서 사용합니다. 입력 검증 실패도 차단으로 취급합니다.
    pub async fn is_blocked_or_fail_closed(&self, jti: &str) -> bool {
        match self.is_blocked(jti).await {
            Ok(blocked) => blocked,
            Err(e) => {
                error!("JTI 차단 여부 확인 실패, 차단으로 처리합니다: {}", e);
                true
            }
        }
    }

    /// 차단을 해제합니다. 관리용.
    pub async fn unblock(&self, jti: &str) -> CacheResult<bool> {
        let key = self.key(jti)?;
        let removed = self.store.del(&[key]).await? > 0;
        if removed {
            info!("JTI 차단 해제: {}", jti.trim());
        }
        Ok(removed)
    }

    /// 기존 차단 항목의 TTL을 다시 설정합니다. 항목이 없으면 `false`.
    pub async fn touch(&self, jti: &str, ttl: Ttl) -> CacheResult<bool> {
        let key = self.key(jti)?;
        if ttl.is_zero() {
            return Ok(self.store.del(&[key]).await? > 0);
        }
        self.store.pexpire(&key, ttl).await
    }

    /// 차단 레코드 조회
    ///
    /// 손상된 레코드는 `None`으로 보고하지만 지우지 않습니다. 차단은 TTL까지 유지됩니다.
    pub async fn get(&self, jti: &str) -> CacheResult<Option<JtiRecord>> {
        let key = self.key(jti)?;
        peek_json(self.store.as_ref(), &key, "JTI").await
    }
}
