//! # Core Module
//!
//! 저장소와 서비스가 공유하는 기반 추상화입니다.
//!
//! ## 모듈 구성
//!
//! - [`clock`] - 주입 가능한 밀리초 시계 (`SystemClock`, `ManualClock`)
//!
//! 전역 싱글톤은 두지 않습니다. 저장소 클라이언트와 시계는 애플리케이션
//! 시작 시 한 번 생성되어 각 리포지토리 생성자에 `Arc`로 전달됩니다.
//!
//! ```rust,ignore
//! let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&redis_config).await?);
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let sessions = SessionRepository::new(store.clone(), clock.clone(), keys.clone(), &config);
//! ```

pub mod clock;

pub use clock::*;
