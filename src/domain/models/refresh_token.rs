//! Refresh token 레코드
//!
//! 토큰 자체는 저장하지 않습니다. 키와 `tokenHash`는 모두 `sha256hex(token)`입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::millis_to_datetime;
use crate::utils::time_utils::{Ttl, remaining_until};

/// `rt:t:<hash>`에 저장되는 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: String,
    /// 회전을 거쳐도 유지되는 세션 계보 ID
    pub session_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    /// 회전 횟수. 최초 발급은 0.
    #[serde(default)]
    pub rotation: u32,
    /// 직전 토큰의 해시
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }

    pub fn remaining(&self, now_ms: i64) -> Ttl {
        remaining_until(now_ms, self.expires_at)
    }

    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        millis_to_datetime(self.expires_at)
    }
}

/// 회전된 토큰 해시에 남기는 표식 (`rt:r:<hash>`)
///
/// 이미 회전된 토큰이 다시 제시되면 이 표식으로 재사용을 판별합니다.
/// 수명은 회전된 토큰의 남은 수명과 같습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuseMarker {
    pub user_id: String,
    pub session_id: String,
    pub rotated_at: i64,
    pub rotation: u32,
}
