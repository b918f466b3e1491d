//! # Domain Models Module
//!
//! 저장소에 JSON으로 기록되는 레코드 타입들입니다.
//! 필드명은 camelCase로 직렬화되며, 시각은 모두 epoch 밀리초(`i64`)입니다.
//!
//! | 레코드 | 키 | 색인 |
//! |--------|----|------|
//! | [`OtpRecord`] | `otp:<subject>[:<kind>]` | - |
//! | [`JtiRecord`] | `jti:<jti>` | - |
//! | [`RefreshTokenRecord`] | `rt:t:<sha256hex(token)>` | `rt:u:<userId>` |
//! | [`ReuseMarker`] | `rt:r:<sha256hex(token)>` | - |
//! | [`SessionRecord`] | `session:<sid>` | `user:<uid>:sessions` |
//!
//! 어떤 레코드도 키의 TTL보다 오래 살아남지 않습니다.

pub mod jti;
pub mod otp;
pub mod refresh_token;
pub mod session;

pub use jti::JtiRecord;
pub use otp::OtpRecord;
pub use refresh_token::{RefreshTokenRecord, ReuseMarker};
pub use session::SessionRecord;
