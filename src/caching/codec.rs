//! # 레코드 직렬화
//!
//! 저장소 레코드는 camelCase JSON 문자열로 저장됩니다. 읽을 때 파싱에 실패한
//! 레코드는 경고 로그를 남기고 삭제를 시도한 뒤 "없음"으로 취급합니다.
//!
//! 키의 존재 자체가 의미를 갖는 레코드(JTI 차단 항목)는 [`peek_json`]으로 읽습니다.
//! 손상되어도 지우지 않으므로 TTL이 끝날 때까지 효력이 유지됩니다.

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::caching::store::KeyValueStore;
use crate::errors::CacheResult;
use crate::utils::hash_utils::redact;

/// 레코드를 JSON 문자열로 직렬화합니다.
pub fn encode<T: Serialize>(value: &T) -> CacheResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// 레코드를 읽어 역직렬화합니다. 손상된 레코드는 삭제 후 `None`.
pub async fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, kind: &str) -> CacheResult<Option<T>> {
    Ok(load_json_raw(store, key, kind).await?.map(|(value, _)| value))
}

/// [`load_json`]과 같지만 저장된 원문도 함께 반환합니다 (compare-and-swap 용).
pub async fn load_json_raw<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    kind: &str,
) -> CacheResult<Option<(T, String)>> {
    decode(store, key, kind, true).await
}

/// 레코드를 읽되, 손상된 레코드는 삭제하지 않고 `None`을 반환합니다.
pub async fn peek_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, kind: &str) -> CacheResult<Option<T>> {
    Ok(decode(store, key, kind, false).await?.map(|(value, _)| value))
}

async fn decode<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    kind: &str,
    purge_corrupt: bool,
) -> CacheResult<Option<(T, String)>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some((value, raw))),
        Err(e) if purge_corrupt => {
            warn!("손상된 {} 레코드를 삭제합니다 ({}...): {}", kind, redact(key), e);
            if let Err(del_err) = store.del(&[key.to_string()]).await {
                debug!("손상된 레코드 삭제 실패 ({}...): {}", redact(key), del_err);
            }
            Ok(None)
        }
        Err(e) => {
            warn!("손상된 {} 레코드 ({}...), 키는 유지합니다: {}", kind, redact(key), e);
            Ok(None)
        }
    }
}
