//! # Redis 키 생성 유틸리티
//!
//! 접두사(prefix), 네임스페이스, 선택적 클러스터 해시 태그, 정규화된 세그먼트를
//! `:` 로 이어 결정적인 키를 만듭니다.
//!
//! ## 키 네임스페이스
//!
//! ```text
//! otp:{subject}[:{kind}]        → OtpRecord JSON
//! jti:{jti}                     → JtiRecord JSON (존재 = 차단됨)
//! rt:t:{sha256hex(token)}       → RefreshTokenRecord JSON
//! rt:u:{user_id}                → Set<token_hash>
//! rt:r:{sha256hex(token)}       → 회전된 토큰의 재사용 감지 마커
//! session:{sid}                 → SessionRecord JSON
//! user:{uid}:sessions           → Set<sid>
//! {prefix}:{id}                 → Rate limit 카운터/ZSET/HASH
//! ```
//!
//! ## 클러스터 해시 태그
//!
//! 해시 태그를 설정하면 `{value}` 세그먼트가 키에 들어가 Redis Cluster에서
//! 같은 슬롯에 배치됩니다. 태그는 [`KeySpace`] 전체에 하나이며 모든 키 패밀리에
//! 똑같이 붙습니다.
//!
//! `PutIndexed`, `DeleteIndexed`, `RotateRefresh`, `RevokeIndexed`는 레코드와 색인을
//! 한 스크립트에서 함께 다루므로, Redis Cluster에서는 태그 없이 `CROSSSLOT` 오류가 납니다.
//! 태그를 쓰면 신뢰 계층의 키가 모두 한 슬롯에 모입니다. 단일 노드나 Sentinel 배포에서는
//! 설정하지 않아도 됩니다.

use crate::utils::hash_utils::sha256_hex;

pub const KEY_SEPARATOR: &str = ":";

/// 키 세그먼트를 정규화합니다.
///
/// 앞뒤 공백을 제거하고, 내부의 연속 공백은 `_` 하나로 바꿉니다.
pub fn normalize_segment(segment: &str) -> String {
    segment.split_whitespace().collect::<Vec<_>>().join("_")
}

/// 세그먼트를 `:` 로 잇습니다. 빈 세그먼트는 버리고 중복 구분자는 하나로 합칩니다.
pub fn join_key<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(|part| normalize_segment(part.as_ref()))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR);

    joined
        .split(KEY_SEPARATOR)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// 클러스터 해시 태그 세그먼트 (`{value}`)
pub fn hash_tag(value: &str) -> String {
    format!("{{{}}}", normalize_segment(value))
}

/// 값 대신 SHA-256 hex를 세그먼트로 사용합니다.
pub fn hashed_segment(value: &str) -> String {
    sha256_hex(value)
}

/// 결정적 키 생성기
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: Option<String>,
    namespace: Option<String>,
    hash_tag: Option<String>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = non_empty(prefix.as_ref());
        self
    }

    pub fn with_namespace(mut self, namespace: impl AsRef<str>) -> Self {
        self.namespace = non_empty(namespace.as_ref());
        self
    }

    /// 모든 키에 `{tag}` 세그먼트를 넣습니다. Redis Cluster에서는 필수입니다.
    pub fn with_hash_tag(mut self, tag: impl AsRef<str>) -> Self {
        self.hash_tag = non_empty(tag.as_ref());
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// 세그먼트로 키를 생성합니다.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let keys = KeyBuilder::new().with_prefix("app").with_hash_tag("u1");
    /// assert_eq!(keys.build(&["session", "abc"]), "app:{u1}:session:abc");
    /// ```
    pub fn build<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(segments.len() + 3);
        if let Some(prefix) = &self.prefix {
            parts.push(prefix.clone());
        }
        if let Some(namespace) = &self.namespace {
            parts.push(namespace.clone());
        }
        if let Some(tag) = &self.hash_tag {
            parts.push(hash_tag(tag));
        }
        parts.extend(segments.iter().map(|s| s.as_ref().to_string()));
        join_key(&parts)
    }

    /// 마지막 세그먼트를 SHA-256 hex로 치환해 키를 생성합니다.
    pub fn hashed<S: AsRef<str>>(&self, segments: &[S], secret: &str) -> String {
        let mut parts: Vec<String> = segments.iter().map(|s| s.as_ref().to_string()).collect();
        parts.push(hashed_segment(secret));
        self.build(&parts)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let normalized = normalize_segment(value);
    if normalized.is_empty() { None } else { Some(normalized) }
}

/// 저장소가 사용하는 고정 키 패밀리
#[derive(Debug, Clone, Default)]
pub struct KeySpace {
    builder: KeyBuilder,
}

impl KeySpace {
    pub fn new(builder: KeyBuilder) -> Self {
        Self { builder }
    }

    pub fn builder(&self) -> &KeyBuilder {
        &self.builder
    }

    pub fn otp(&self, subject: &str, kind: Option<&str>) -> String {
        match kind {
            Some(kind) => self.builder.build(&["otp", subject, kind]),
            None => self.builder.build(&["otp", subject]),
        }
    }

    pub fn jti(&self, jti: &str) -> String {
        self.builder.build(&["jti", jti])
    }

    pub fn refresh_token(&self, token_hash: &str) -> String {
        self.builder.build(&["rt", "t", token_hash])
    }

    /// `refresh_token(hash)`에서 해시를 뺀 앞부분 (`rt:t:`)
    pub fn refresh_token_prefix(&self) -> String {
        format!("{}{}", self.builder.build(&["rt", "t"]), KEY_SEPARATOR)
    }

    pub fn refresh_user_index(&self, user_id: &str) -> String {
        self.builder.build(&["rt", "u", user_id])
    }

    pub fn refresh_reuse_marker(&self, token_hash: &str) -> String {
        self.builder.build(&["rt", "r", token_hash])
    }

    pub fn session(&self, sid: &str) -> String {
        self.builder.build(&["session", sid])
    }

    pub fn session_prefix(&self) -> String {
        format!("{}{}", self.builder.build(&["session"]), KEY_SEPARATOR)
    }

    pub fn user_sessions(&self, uid: &str) -> String {
        self.builder.build(&["user", uid, "sessions"])
    }

    pub fn rate_limit(&self, prefix: &str, id: &str) -> String {
        self.builder.build(&[prefix, id])
    }
}
