//! 저장소 위의 레코드 리포지토리
//!
//! 모든 리포지토리는 [`KeyValueStore`](crate::caching::KeyValueStore), [`Clock`](crate::core::Clock),
//! [`KeySpace`](crate::utils::key_utils::KeySpace)를 생성자로 주입받습니다. 전역 인스턴스는 없습니다.
//!
//! | 리포지토리 | 키 |
//! |------------|----|
//! | [`otp::OtpRepository`] | `otp:<subject>[:<kind>]` |
//! | [`jti::JtiRepository`] | `jti:<jti>` |
//! | [`tokens::RefreshTokenRepository`] | `rt:t:<hash>`, `rt:u:<userId>`, `rt:r:<hash>` |
//! | [`sessions::SessionRepository`] | `session:<sid>`, `user:<uid>:sessions` |
//!
//! # Examples
//!
//! ```rust,ignore
//! let sessions = SessionRepository::new(store.clone(), clock.clone(), keys.clone(), &config);
//! let session = sessions.create("u1", CreateSessionOptions::default()).await?;
//! ```

pub mod jti;
pub mod otp;
pub mod sessions;
pub mod tokens;
