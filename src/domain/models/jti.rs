//! JTI 차단 레코드

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `jti:<jti>`에 저장되는 최소한의 포렌식 레코드
///
/// 키가 존재하면 "차단됨"입니다. 키가 없다고 해서 토큰이 정상이라는 뜻은 아닙니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JtiRecord {
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}
