//! 터미널 출력 포맷팅 유틸리티
//!
//! 바이너리 기동 과정에서 사용되는 출력 함수들입니다.
//! 박스 형태의 제목, 진행 단계 표시, 유효 설정 요약을 출력합니다.

use crate::config::{RedisConfig, TrustCacheConfig};
use crate::utils::time_utils::format_duration;

/// 박스 형태로 둘러싸인 제목을 출력합니다
///
/// # Examples
///
/// ```rust,ignore
/// print_boxed_title("Trust Cache Ready");
/// ```
///
/// Output:
/// ```text
/// ╔══════════════════════════════════════════════════╗
/// ║                Trust Cache Ready                 ║
/// ╚══════════════════════════════════════════════════╝
/// ```
pub fn print_boxed_title(title: &str) {
    let border = "═".repeat(50);

    println!("╔{}╗", border);
    println!("║{:^50}║", title);
    println!("╚{}╝", border);
}

/// 진행 단계 시작 (`→ Step 1: ...`)
pub fn print_step_start(step: u8, description: &str) {
    println!("→ Step {}: {}", step, description);
}

/// 진행 단계 완료 (`✓ Step 1: ...`)
pub fn print_step_complete(step: u8, description: &str) {
    println!("✓ Step {}: {}", step, description);
}

/// 들여쓰기된 하위 항목 (`   ├─ name: status`)
pub fn print_sub_task(name: &str, status: &str) {
    println!("   ├─ {}: {}", name, status);
}

/// 요약에 출력할 (항목, 값) 목록
pub fn config_summary(redis: &RedisConfig, config: &TrustCacheConfig) -> Vec<(&'static str, String)> {
    vec![
        ("Redis", redis.redacted_url()),
        ("Key prefix", redis.key_prefix.clone().unwrap_or_else(|| "-".to_string())),
        ("Session TTL", format_duration(config.session_ttl)),
        ("Refresh token TTL", format_duration(config.refresh_token_ttl)),
        ("OTP TTL", format_duration(config.otp_ttl)),
        (
            "Login rate limit",
            format!("{} / {}", config.rate_limit_max, format_duration(config.rate_limit_window)),
        ),
        ("OTP max attempts", config.otp_max_attempts.to_string()),
        ("Refresh tokens per user", config.refresh_token_max_per_user.to_string()),
        ("Session index min TTL", format_duration(config.session_index_min_ttl)),
    ]
}

/// 유효 설정 요약을 출력합니다
///
/// Output:
/// ```text
/// ╔══════════════════════════════════════════════════╗
/// ║              🔐 TRUST CACHE READY               ║
/// ╚══════════════════════════════════════════════════╝
///    ├─ Redis: redis://localhost:6379
///    ├─ Session TTL: 7d
///    ...
/// ```
pub fn print_config_summary(redis: &RedisConfig, config: &TrustCacheConfig) {
    println!();
    print_boxed_title("🔐 TRUST CACHE READY");
    for (name, value) in config_summary(redis, config) {
        print_sub_task(name, &value);
    }
    println!();
}
