use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::caching::codec::{encode, load_json, load_json_raw};
use crate::caching::{AtomicScript, KeyValueStore};
use crate::config::TrustCacheConfig;
use crate::core::{Clock, millis_to_datetime};
use crate::domain::models::{RefreshTokenRecord, ReuseMarker};
use crate::errors::{CacheError, CacheResult};
use crate::utils::hash_utils::{fingerprint_token, random_token, redact};
use crate::utils::key_utils::KeySpace;
use crate::utils::string_utils::{clean_optional_string, validate_required_string};
use crate::utils::time_utils::{Ttl, expires_at_ms, remaining_until};

/// 불투명 토큰의 랜덤 바이트 수 (base64url로 43자)
const TOKEN_BYTES: usize = 32;

/// 발급 옵션
#[derive(Debug, Clone, Default)]
pub struct IssueRefreshOptions {
    /// 기존 세션 계보에 이어 붙일 때 지정. 없으면 새 UUID.
    pub session_id: Option<String>,
    pub meta: Option<Value>,
    /// 없으면 설정 기본값 (30일)
    pub ttl: Option<Ttl>,
}

/// 클라이언트에게 전달할 새 refresh token
///
/// `token`은 이 값 외에는 어디에도 남지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub user_id: String,
    pub session_id: String,
    pub rotation: u32,
    pub expires_at: DateTime<Utc>,
}

/// 검증 결과
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshVerification {
    Valid(RefreshTokenRecord),
    /// 발급된 적 없거나 폐기됨
    Missing,
    /// 레코드는 있었으나 만료되어 방금 삭제됨
    Expired,
    /// 이미 회전된 토큰이 다시 제시됨
    Reused { user_id: String, session_id: String },
}

impl RefreshVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, RefreshVerification::Valid(_))
    }
}

/// Refresh token 리포지토리
///
/// 토큰 원문은 저장하지 않고 `sha256hex(token)`을 키로 씁니다.
///
/// * `rt:t:<hash>` - [`RefreshTokenRecord`]
/// * `rt:u:<userId>` - 사용자의 살아 있는 토큰 해시 집합
/// * `rt:r:<hash>` - 회전된 토큰의 재사용 표식 ([`ReuseMarker`])
///
/// 레코드와 색인은 항상 하나의 원자 스크립트로 함께 갱신됩니다.
pub struct RefreshTokenRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    default_ttl: Ttl,
    max_per_user: usize,
}

impl RefreshTokenRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, keys: KeySpace, config: &TrustCacheConfig) -> Self {
        Self {
            store,
            clock,
            keys,
            default_ttl: config.refresh_token_ttl,
            max_per_user: config.refresh_token_max_per_user,
        }
    }

    fn token_hash(token: &str) -> CacheResult<String> {
        if token.trim().is_empty() {
            return Err(CacheError::ValidationError("refresh token은(는) 필수입니다".to_string()));
        }
        Ok(fingerprint_token(token.trim()))
    }

    /// 새 refresh token을 발급합니다.
    ///
    /// 발급 후 사용자의 토큰 수가 상한을 넘으면 가장 오래된 토큰부터 폐기합니다.
    ///
    /// # Arguments
    ///
    /// * `user_id` - 토큰 소유자
    /// * `options` - 세션 계보 ID, 메타데이터, TTL
    ///
    /// # Errors
    ///
    /// * `CacheError::ValidationError` - 빈 사용자 ID 또는 0 TTL
    /// * `CacheError::StoreUnavailable` - 저장소 오류
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let issued = refresh_repo.issue("u1", IssueRefreshOptions::default()).await?;
    /// // issued.token 을 쿠키로 전달
    /// ```
    pub async fn issue(&self, user_id: &str, options: IssueRefreshOptions) -> CacheResult<IssuedRefreshToken> {
        let user_id = validate_required_string(user_id, "user_id")?;
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::ValidationError("refresh token TTL must be positive".to_string()));
        }

        let session_id =
            clean_optional_string(options.session_id).unwrap_or_else(|| Uuid::new_v4().to_string());
        let token = random_token(TOKEN_BYTES);
        let token_hash = fingerprint_token(&token);
        let now = self.clock.now_ms();

        let record = RefreshTokenRecord {
            token_hash: token_hash.clone(),
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            created_at: now,
            expires_at: expires_at_ms(now, ttl),
            rotation: 0,
            rotated_from: None,
            meta: options.meta,
        };

        self.store
            .eval(
                AtomicScript::PutIndexed,
                &[self.keys.refresh_token(&token_hash), self.keys.refresh_user_index(&user_id)],
                &[
                    encode(&record)?,
                    ttl.millis().to_string(),
                    token_hash.clone(),
                    ttl.millis().to_string(),
                ],
            )
            .await?;

        info!("Refresh token 발급: user {} ({}...)", user_id, redact(&token_hash));

        let trimmed = self.enforce_max_per_user(&user_id).await?;
        if trimmed > 0 {
            debug!("사용자 {}의 오래된 refresh token {}개 폐기", user_id, trimmed);
        }

        Ok(IssuedRefreshToken {
            token,
            user_id,
            session_id,
            rotation: 0,
            expires_at: record.expires_at_utc(),
        })
    }

    /// 토큰을 검증합니다.
    ///
    /// 만료된 레코드는 읽는 시점에 삭제되고 `Expired`로 보고됩니다.
    /// 레코드가 없지만 재사용 표식이 있으면 `Reused`입니다.
    pub async fn verify(&self, token: &str) -> CacheResult<RefreshVerification> {
        let token_hash = Self::token_hash(token)?;
        let key = self.keys.refresh_token(&token_hash);

        if let Some(record) = load_json::<RefreshTokenRecord>(self.store.as_ref(), &key, "refresh token").await? {
            if record.is_expired(self.clock.now_ms()) {
                self.delete_indexed(&record).await?;
                return Ok(RefreshVerification::Expired);
            }
            return Ok(RefreshVerification::Valid(record));
        }

        match self.reuse_marker(&token_hash).await? {
            Some(marker) => {
                warn!(
                    "회전된 refresh token 재제시: user {} ({}...)",
                    marker.user_id,
                    redact(&token_hash)
                );
                Ok(RefreshVerification::Reused {
                    user_id: marker.user_id,
                    session_id: marker.session_id,
                })
            }
            None => Ok(RefreshVerification::Missing),
        }
    }

    /// 토큰을 회전합니다.
    ///
    /// 제시된 레코드가 읽은 그대로일 때만 삭제하고 후속 토큰을 설치합니다 (compare-and-swap).
    /// 같은 토큰으로 동시에 두 번 회전하면 하나만 성공하고 나머지는 재사용으로 판정됩니다.
    ///
    /// 후속 토큰은 이전 토큰이 발급될 때의 수명(`expires_at - created_at`)을 그대로 이어받습니다.
    ///
    /// # Errors
    ///
    /// * `CacheError::ReuseDetected` - 이미 회전된 토큰
    /// * `CacheError::NotFound` - 발급된 적 없거나 폐기된 토큰
    /// * `CacheError::Expired` - 만료된 토큰 (레코드는 삭제됨)
    pub async fn rotate(&self, token: &str, meta: Option<Value>) -> CacheResult<IssuedRefreshToken> {
        let old_hash = Self::token_hash(token)?;
        let old_key = self.keys.refresh_token(&old_hash);

        let Some((current, raw)) =
            load_json_raw::<RefreshTokenRecord>(self.store.as_ref(), &old_key, "refresh token").await?
        else {
            return Err(self.missing_or_reused(&old_hash).await?);
        };

        let now = self.clock.now_ms();
        if current.is_expired(now) {
            self.delete_indexed(&current).await?;
            return Err(CacheError::Expired("refresh token".to_string()));
        }

        let lifetime = remaining_until(current.created_at, current.expires_at);
        let ttl = if lifetime.is_zero() { self.default_ttl } else { lifetime };
        let token = random_token(TOKEN_BYTES);
        let new_hash = fingerprint_token(&token);
        let successor = RefreshTokenRecord {
            token_hash: new_hash.clone(),
            user_id: current.user_id.clone(),
            session_id: current.session_id.clone(),
            created_at: now,
            expires_at: expires_at_ms(now, ttl),
            rotation: current.rotation.saturating_add(1),
            rotated_from: Some(old_hash.clone()),
            meta: meta.or_else(|| current.meta.clone()),
        };
        let marker = ReuseMarker {
            user_id: current.user_id.clone(),
            session_id: current.session_id.clone(),
            rotated_at: now,
            rotation: current.rotation,
        };

        let reply = self
            .store
            .eval(
                AtomicScript::RotateRefresh,
                &[
                    old_key,
                    self.keys.refresh_token(&new_hash),
                    self.keys.refresh_user_index(&current.user_id),
                    self.keys.refresh_reuse_marker(&old_hash),
                ],
                &[
                    raw,
                    encode(&successor)?,
                    ttl.millis().to_string(),
                    old_hash.clone(),
                    new_hash.clone(),
                    ttl.millis().to_string(),
                    encode(&marker)?,
                    current.remaining(now).millis().to_string(),
                ],
            )
            .await?;

        match reply.int(0)? {
            1 => {
                info!(
                    "Refresh token 회전: user {} ({}... -> {}..., rotation {})",
                    successor.user_id,
                    redact(&old_hash),
                    redact(&new_hash),
                    successor.rotation
                );
                Ok(IssuedRefreshToken {
                    token,
                    user_id: successor.user_id.clone(),
                    session_id: successor.session_id.clone(),
                    rotation: successor.rotation,
                    expires_at: millis_to_datetime(successor.expires_at),
                })
            }
            // 읽은 뒤 다른 요청이 먼저 회전했거나 폐기함
            _ => Err(self.missing_or_reused(&old_hash).await?),
        }
    }

    /// 토큰 하나를 폐기합니다 (로그아웃). 재사용 표식은 남기지 않습니다.
    pub async fn revoke(&self, token: &str) -> CacheResult<bool> {
        let token_hash = Self::token_hash(token)?;
        let key = self.keys.refresh_token(&token_hash);
        let Some(record) = load_json::<RefreshTokenRecord>(self.store.as_ref(), &key, "refresh token").await? else {
            return Ok(false);
        };

        let deleted = self.delete_indexed(&record).await?;
        if deleted {
            info!("Refresh token 폐기: user {} ({}...)", record.user_id, redact(&token_hash));
        }
        Ok(deleted)
    }

    /// 사용자의 모든 refresh token을 폐기하고 폐기한 개수를 반환합니다.
    ///
    /// 색인 조회와 삭제는 한 번의 원자 스크립트입니다. 동시에 발급된 토큰은
    /// 함께 폐기되거나 색인에 남으며, 색인 밖에서 살아 있지 않습니다.
    pub async fn revoke_all_for_user(&self, user_id: &str) -> CacheResult<u64> {
        let user_id = validate_required_string(user_id, "user_id")?;
        let reply = self
            .store
            .eval(
                AtomicScript::RevokeIndexed,
                &[self.keys.refresh_user_index(&user_id)],
                &[self.keys.refresh_token_prefix()],
            )
            .await?;
        let removed = u64::try_from(reply.int(0)?).unwrap_or(0);

        info!("사용자 {}의 refresh token {}개 일괄 폐기", user_id, removed);
        Ok(removed)
    }

    /// 사용자의 살아 있는 토큰 레코드를 최신순으로 반환합니다.
    ///
    /// 레코드가 사라진 색인 항목은 이 과정에서 정리됩니다.
    pub async fn list_for_user(&self, user_id: &str) -> CacheResult<Vec<RefreshTokenRecord>> {
        let user_id = validate_required_string(user_id, "user_id")?;
        let index_key = self.keys.refresh_user_index(&user_id);
        let now = self.clock.now_ms();

        let mut live = Vec::new();
        let mut orphans = Vec::new();
        for hash in self.store.smembers(&index_key).await? {
            let key = self.keys.refresh_token(&hash);
            match load_json::<RefreshTokenRecord>(self.store.as_ref(), &key, "refresh token").await? {
                Some(record) if !record.is_expired(now) => live.push(record),
                Some(expired) => {
                    self.delete_indexed(&expired).await?;
                }
                None => orphans.push(hash),
            }
        }

        if !orphans.is_empty() {
            warn!("사용자 {}의 고아 refresh token 색인 {}개 정리", user_id, orphans.len());
            self.store.srem(&index_key, &orphans).await?;
        }

        live.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.token_hash.cmp(&b.token_hash))
        });
        Ok(live)
    }

    /// 상한을 넘는 가장 오래된 토큰들을 폐기하고 폐기한 개수를 반환합니다.
    pub async fn enforce_max_per_user(&self, user_id: &str) -> CacheResult<u64> {
        let records = self.list_for_user(user_id).await?;
        if records.len() <= self.max_per_user {
            return Ok(0);
        }

        let mut removed = 0;
        for record in &records[self.max_per_user..] {
            if self.delete_indexed(record).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn delete_indexed(&self, record: &RefreshTokenRecord) -> CacheResult<bool> {
        let reply = self
            .store
            .eval(
                AtomicScript::DeleteIndexed,
                &[
                    self.keys.refresh_token(&record.token_hash),
                    self.keys.refresh_user_index(&record.user_id),
                ],
                &[record.token_hash.clone()],
            )
            .await?;
        Ok(reply.int(0)? == 1)
    }

    async fn reuse_marker(&self, token_hash: &str) -> CacheResult<Option<ReuseMarker>> {
        let key = self.keys.refresh_reuse_marker(token_hash);
        load_json(self.store.as_ref(), &key, "reuse marker").await
    }

    async fn missing_or_reused(&self, token_hash: &str) -> CacheResult<CacheError> {
        Ok(match self.reuse_marker(token_hash).await? {
            Some(marker) => {
                warn!(
                    "Refresh token 재사용 감지: user {} session {} ({}...)",
                    marker.user_id,
                    marker.session_id,
                    redact(token_hash)
                );
                CacheError::ReuseDetected {
                    user_id: marker.user_id,
                    session_id: marker.session_id,
                }
            }
            None => CacheError::NotFound("refresh token".to_string()),
        })
    }
}
