//! OTP 레코드
//!
//! 평문 코드는 저장하지 않고 `sha256(code)`만 보관합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `otp:<subject>[:<kind>]`에 저장되는 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    /// sha256(code) hex
    pub hash: String,
    /// 발급 시각 (epoch ms)
    pub created_at: i64,
    /// 실패한 검증 횟수. 레코드가 삭제될 때까지 감소하지 않습니다.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl OtpRecord {
    pub fn new(hash: String, created_at: i64, max_attempts: Option<u32>, meta: Option<Value>) -> Self {
        Self {
            hash,
            created_at,
            attempts: 0,
            max_attempts,
            meta,
        }
    }
}
