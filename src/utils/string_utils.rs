//! # 문자열 유틸리티
//!
//! 저장소 입력값(사용자 ID, subject, 클라이언트 메타데이터) 검증과 정리를 담당합니다.

use serde::Deserialize;

use crate::errors::CacheError;

/// User-Agent 등 클라이언트 메타데이터의 최대 저장 길이 (문자 수)
pub const MAX_CLIENT_META_CHARS: usize = 512;

/// 필수 문자열 필드 검증 및 정리
///
/// # 인자
/// * `value` - 검증할 문자열
/// * `field_name` - 필드명 (에러 메시지용)
///
/// # 반환값
/// * `Ok(String)` - 앞뒤 공백이 제거된 문자열
/// * `Err(CacheError::ValidationError)` - 빈 문자열이거나 공백만 있는 경우
pub fn validate_required_string(value: &str, field_name: &str) -> Result<String, CacheError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CacheError::ValidationError(format!(
            "{}은(는) 필수입니다",
            field_name
        )));
    }
    Ok(trimmed.to_string())
}

/// 선택적 문자열 필드 정리
///
/// None 이거나 공백뿐이면 None, 아니면 trim 한 값을 반환합니다.
pub fn clean_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// 클라이언트 메타데이터 정리 (trim + 최대 길이 제한)
pub fn clean_client_meta(value: Option<String>) -> Option<String> {
    clean_optional_string(value).map(|s| truncate_chars(&s, MAX_CLIENT_META_CHARS))
}

/// 문자 경계를 지키며 최대 `max_chars` 글자로 자릅니다.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// 선택적 문자열 필드를 위한 serde deserializer
///
/// `#[serde(deserialize_with = "deserialize_optional_string")]`와 함께 사용하며,
/// 빈 문자열/공백 문자열을 None으로 변환합니다.
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(clean_optional_string(opt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required_string() {
        assert_eq!(validate_required_string("u1", "user_id").unwrap(), "u1");
        assert_eq!(validate_required_string("  u1  ", "user_id").unwrap(), "u1");

        assert!(validate_required_string("", "user_id").is_err());
        assert!(validate_required_string("\t\n", "user_id").is_err());
    }

    #[test]
    fn test_clean_optional_string() {
        assert_eq!(clean_optional_string(Some("  10.0.0.1 ".to_string())), Some("10.0.0.1".to_string()));
        assert_eq!(clean_optional_string(Some("   ".to_string())), None);
        assert_eq!(clean_optional_string(None), None);
    }

    #[test]
    fn test_clean_client_meta_truncates() {
        let long = "가".repeat(MAX_CLIENT_META_CHARS + 10);
        let cleaned = clean_client_meta(Some(long)).unwrap();

        assert_eq!(cleaned.chars().count(), MAX_CLIENT_META_CHARS);
    }

    #[test]
    fn test_deserialize_optional_string() {
        #[derive(Deserialize)]
        struct Meta {
            #[serde(default, deserialize_with = "deserialize_optional_string")]
            ua: Option<String>,
        }

        let meta: Meta = serde_json::from_str(r#"{"ua": "  Mozilla/5.0  "}"#).unwrap();
        assert_eq!(meta.ua, Some("Mozilla/5.0".to_string()));

        let meta: Meta = serde_json::from_str(r#"{"ua": ""}"#).unwrap();
        assert_eq!(meta.ua, None);

        let meta: Meta = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(meta.ua, None);
    }
}
