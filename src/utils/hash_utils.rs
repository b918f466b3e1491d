//! # 해싱/지문 유틸리티
//!
//! SHA-256, HMAC-SHA256, 상수 시간 비교, 정규화된 JSON 문자열화,
//! 디바이스/IP/토큰 지문(fingerprint) 생성을 담당합니다.
//!
//! ## 보안 원칙
//!
//! - 비밀값(OTP 코드, refresh token)은 평문으로 저장하지 않고 해시만 저장
//! - 비밀값 비교는 [`constant_time_eq`]로만 수행
//! - 로그에는 [`redact`]로 잘라낸 해시 앞부분만 출력
//!
//! ## 정규화 JSON
//!
//! [`canonical_stringify`]는 객체 키를 재귀적으로 정렬하므로, 필드 삽입 순서와
//! 무관하게 의미가 같은 값은 같은 해시를 가집니다. 특수 타입은 직렬화 단계에서
//! 문자열로 강제 변환됩니다:
//!
//! | 타입 | 표현 |
//! |------|------|
//! | `chrono::DateTime<Utc>` | RFC 3339 (ISO 8601) 문자열 |
//! | `i128` / `u128` | 10진수 문자열 ([`int128_string`]) |
//! | 바이트 버퍼 | 패딩 없는 base64url ([`base64url_bytes`]) |

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::{CacheResult, ErrorContext};

type HmacSha256 = Hmac<Sha256>;

/// 다이제스트 출력 인코딩
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEncoding {
    Hex,
    /// 패딩 없는 base64url
    Base64Url,
}

impl DigestEncoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            DigestEncoding::Hex => hex::encode(bytes),
            DigestEncoding::Base64Url => URL_SAFE_NO_PAD.encode(bytes),
        }
    }
}

pub fn sha256(data: impl AsRef<[u8]>, encoding: DigestEncoding) -> String {
    encoding.encode(&Sha256::digest(data.as_ref()))
}

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    sha256(data, DigestEncoding::Hex)
}

pub fn sha256_base64url(data: impl AsRef<[u8]>) -> String {
    sha256(data, DigestEncoding::Base64Url)
}

/// HMAC-SHA256 서명을 계산합니다.
///
/// # Errors
///
/// * `CacheError::InternalError` - HMAC 키 초기화 실패
pub fn hmac_sha256(key: &[u8], data: impl AsRef<[u8]>, encoding: DigestEncoding) -> CacheResult<String> {
    let mut mac = HmacSha256::new_from_slice(key).context("HMAC key initialization failed")?;
    mac.update(data.as_ref());
    Ok(encoding.encode(&mac.finalize().into_bytes()))
}

/// 두 바이트열을 상수 시간에 비교합니다.
///
/// 양쪽을 먼저 SHA-256으로 고정 길이 다이제스트로 만든 뒤 `subtle`로
/// 비교하므로, 길이가 달라도 조기 반환하지 않습니다.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let left = Sha256::digest(a);
    let right = Sha256::digest(b);
    bool::from(left.as_slice().ct_eq(right.as_slice()))
}

pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// JSON 값을 키 정렬된 정규 문자열로 변환합니다.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// 직렬화 가능한 값을 정규 JSON 문자열로 변환합니다.
///
/// # Errors
///
/// * `CacheError::Serialization` - 값이 JSON으로 표현될 수 없는 경우
pub fn canonical_stringify<T: Serialize + ?Sized>(value: &T) -> CacheResult<String> {
    let json = serde_json::to_value(value)?;
    Ok(canonical_json(&json))
}

/// 정규 JSON의 SHA-256 hex 해시
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> CacheResult<String> {
    Ok(sha256_hex(canonical_stringify(value)?))
}

/// 토큰 지문. 저장소 키에 쓰이는 `sha256hex(token)`.
pub fn fingerprint_token(token: &str) -> String {
    sha256_hex(token)
}

/// IP 주소 지문. 서버 비밀키로 HMAC하여 IP 평문이 남지 않게 합니다.
pub fn fingerprint_ip(ip: &str, secret: &[u8]) -> CacheResult<String> {
    let normalized = ip.trim().to_ascii_lowercase();
    hmac_sha256(secret, normalized, DigestEncoding::Hex)
}

/// 디바이스 지문
///
/// User-Agent, IP, 추가 속성을 정규 JSON으로 묶어 해시합니다.
/// 입력 객체의 키 순서가 달라도 같은 지문이 나옵니다.
pub fn fingerprint_device(user_agent: Option<&str>, ip: Option<&str>, extra: Option<&Value>) -> String {
    let payload = serde_json::json!({
        "ua": user_agent.map(str::trim),
        "ip": ip.map(|v| v.trim().to_ascii_lowercase()),
        "extra": extra,
    });
    sha256_base64url(canonical_json(&payload))
}

/// 로그 출력용으로 해시 앞 12글자만 남깁니다.
pub fn redact(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// 암호학적으로 안전한 불투명 토큰을 생성합니다 (base64url).
pub fn random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 짧은 랜덤 hex 접미사 (sliding window 멤버 고유화 등)
pub fn random_suffix() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 바이트 버퍼를 패딩 없는 base64url 문자열로 직렬화하는 serde 모듈
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Blob {
///     #[serde(with = "crate::utils::hash_utils::base64url_bytes")]
///     data: Vec<u8>,
/// }
/// ```
pub mod base64url_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// 128비트 정수를 10진수 문자열로 직렬화하는 serde 모듈
pub mod int128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
