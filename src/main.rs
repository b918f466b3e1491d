//! 인센드 신뢰 캐시 점검 도구
//!
//! 환경 설정을 읽고 Redis에 연결해 응답을 확인한 뒤 유효 설정을 출력합니다.
//! 저장소에 닿을 수 없으면 0이 아닌 코드로 종료합니다.

use std::process::ExitCode;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};

use auth_trust_cache::caching::{AtomicScript, KeyValueStore, RedisStore};
use auth_trust_cache::config::{Environment, RedisConfig, TrustCacheConfig};
use auth_trust_cache::core::SystemClock;
use auth_trust_cache::errors::CacheResult;
use auth_trust_cache::services::trust_service::TrustLayer;
use auth_trust_cache::utils::display_terminal::{
    print_config_summary, print_step_complete, print_step_start, print_sub_task,
};
use auth_trust_cache::utils::key_utils::KeySpace;

#[tokio::main]
async fn main() -> ExitCode {
    load_env_file();
    init_logging();

    info!("🚀 신뢰 캐시 점검 시작 ({})", Environment::current().as_str());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ 신뢰 캐시 초기화 실패: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CacheResult<()> {
    print_step_start(1, "설정 로드");
    let redis_config = RedisConfig::from_env();
    let config = TrustCacheConfig::from_env();
    print_step_complete(1, "설정 로드");

    print_step_start(2, "Redis 연결");
    let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&redis_config).await?);
    store.ping().await?;
    print_sub_task("PING", "PONG");
    print_sub_task("Atomic scripts", &AtomicScript::ALL.len().to_string());
    print_step_complete(2, "Redis 연결");

    print_step_start(3, "Trust layer 구성");
    let keys = KeySpace::new(redis_config.key_builder());
    let trust = TrustLayer::new(store, Arc::new(SystemClock), keys, config)?;
    print_step_complete(3, "Trust layer 구성");

    print_config_summary(&redis_config, trust.config());
    Ok(())
}

/// 환경별 설정 파일을 로드합니다
///
/// # Environment Variables
///
/// * `PROFILE=dev` - .env.dev 파일 로드 (기본값)
/// * `PROFILE=prod` - .env.prod 파일 로드
/// * 기타 - 기본 .env 파일 로드
fn load_env_file() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "dev".to_string());

    match profile.as_str() {
        "prod" => {
            if let Err(e) = dotenv::from_filename(".env.prod") {
                eprintln!(".env.prod 파일 로드 실패: {}", e);
            }
        }
        "dev" => {
            if let Err(e) = dotenv::from_filename(".env.dev") {
                eprintln!(".env.dev 파일 로드 실패: {}", e);
            }
        }
        _ => {
            dotenv().ok();
        }
    }
}

/// 로깅 시스템을 초기화합니다
///
/// # Environment Variables
///
/// * `RUST_LOG` - 로깅 레벨 설정 (기본값: "info")
///
/// # Examples
///
/// ```bash
/// RUST_LOG=auth_trust_cache::repositories=debug cargo run
/// ```
fn init_logging() {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
}
