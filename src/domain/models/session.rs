//! 세션 레코드

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::millis_to_datetime;
use crate::utils::string_utils::deserialize_optional_string;
use crate::utils::time_utils::{Ttl, remaining_until};

/// `session:<sid>`에 저장되는 레코드. `user:<uid>:sessions` 집합으로 색인됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub sid: String,
    pub uid: String,
    pub issued_at: i64,
    /// touch/rotate 때마다 `now + ttl`로 다시 계산됩니다.
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl SessionRecord {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_camel_case() {
        let record = SessionRecord {
            sid: "s1".into(),
            uid: "u1".into(),
            issued_at: 1_000,
            expires_at: 61_000,
            ip: Some("10.0.0.1".into()),
            ua: None,
            meta: None,
        };
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["issuedAt"], 1_000);
        assert_eq!(json["expiresAt"], 61_000);
        assert!(json.get("ua").is_none());
        assert_eq!(record.remaining(31_000), Ttl::from_secs(30));
        assert!(record.is_expired(61_000));
    }

    #[test]
    fn test_blank_client_meta_reads_as_none() {
        let record: SessionRecord =
            serde_json::from_str(r#"{"sid":"s","uid":"u","issuedAt":1,"expiresAt":2,"ua":"  "}"#).unwrap();
        assert_eq!(record.ua, None);
    }
}
