//! # 시간/TTL 유틸리티
//!
//! `"2h30m"`, `"500ms"` 같은 기간 문자열과 초/밀리초 값을 상호 변환합니다.
//! 모든 저장소 API는 단위가 명시된 [`Ttl`]을 받으며, 단위 없는 숫자는
//! 호출자가 지정한 기본 단위로만 해석합니다.
//!
//! ## 지원 단위
//!
//! | 접미사 | 단위 |
//! |--------|------|
//! | `ms` | 밀리초 |
//! | `s`, `sec`, `secs` | 초 |
//! | `m`, `min`, `mins` | 분 |
//! | `h`, `hr`, `hrs` | 시간 |
//! | `d`, `day`, `days` | 일 |
//! | `w`, `week`, `weeks` | 주 |
//!
//! 해석할 수 없는 입력은 에러 대신 0 기간이 됩니다.
//!
//! ```rust,ignore
//! use crate::utils::time_utils::{parse_duration, DurationUnit, Ttl};
//!
//! assert_eq!(Ttl::parse("2h30m").secs(), 9000);
//! assert_eq!(parse_duration(5u64, DurationUnit::Minutes).secs(), 300);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// 초 단위 값
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seconds(pub u64);

/// 밀리초 단위 값
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Millis(pub u64);

/// 단위 없는 숫자를 해석할 때 사용하는 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl DurationUnit {
    /// 한 단위가 몇 밀리초인지 반환합니다.
    pub fn millis_per_unit(self) -> u64 {
        match self {
            DurationUnit::Millis => 1,
            DurationUnit::Seconds => 1_000,
            DurationUnit::Minutes => 60_000,
            DurationUnit::Hours => 3_600_000,
            DurationUnit::Days => 86_400_000,
            DurationUnit::Weeks => 604_800_000,
        }
    }

    /// 기간 문자열의 단위 접미사를 해석합니다.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "ms" | "msec" | "msecs" | "millis" => Some(DurationUnit::Millis),
            "s" | "sec" | "secs" | "second" | "seconds" => Some(DurationUnit::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Some(DurationUnit::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(DurationUnit::Hours),
            "d" | "day" | "days" => Some(DurationUnit::Days),
            "w" | "wk" | "week" | "weeks" => Some(DurationUnit::Weeks),
            _ => None,
        }
    }
}

/// 밀리초 → 초 변환 시 반올림 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    /// 올림 - 남은 시간을 절대 적게 보고하지 않음
    #[default]
    Ceil,
    Floor,
    Round,
}

/// 밀리초 정밀도의 만료 기간
///
/// 내부적으로 밀리초를 보관하며, 초 단위가 필요한 곳에서는
/// [`RoundingMode`]를 명시해 변환합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ttl {
    millis: u64,
}

impl Ttl {
    pub const ZERO: Ttl = Ttl { millis: 0 };

    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self { millis: secs.saturating_mul(1_000) }
    }

    pub const fn from_mins(mins: u64) -> Self {
        Self { millis: mins.saturating_mul(60_000) }
    }

    pub const fn from_hours(hours: u64) -> Self {
        Self { millis: hours.saturating_mul(3_600_000) }
    }

    pub const fn from_days(days: u64) -> Self {
        Self { millis: days.saturating_mul(86_400_000) }
    }

    /// 기간 문자열을 해석합니다. 단위 없는 숫자는 초로 봅니다.
    pub fn parse(input: &str) -> Self {
        parse_duration(input, DurationUnit::Seconds)
    }

    pub fn millis(self) -> u64 {
        self.millis
    }

    /// 부호 있는 밀리초. `i64::MAX`에서 포화합니다.
    pub fn millis_i64(self) -> i64 {
        i64::try_from(self.millis).unwrap_or(i64::MAX)
    }

    /// 올림 처리된 초 값
    pub fn secs(self) -> u64 {
        ms_to_seconds(self.millis, RoundingMode::Ceil)
    }

    pub fn as_millis(self) -> Millis {
        Millis(self.millis)
    }

    pub fn as_secs(self, mode: RoundingMode) -> Seconds {
        Seconds(ms_to_seconds(self.millis, mode))
    }

    /// (초, 밀리초) 쌍으로 분리합니다. 초는 올림 처리됩니다.
    pub fn split(self) -> (Seconds, Millis) {
        (self.as_secs(RoundingMode::Ceil), self.as_millis())
    }

    pub fn is_zero(self) -> bool {
        self.millis == 0
    }

    pub fn saturating_sub(self, other: Ttl) -> Ttl {
        Ttl::from_millis(self.millis.saturating_sub(other.millis))
    }

    pub fn as_std(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.millis)
    }

    pub fn as_chrono(self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.millis).unwrap_or(i64::MAX))
    }
}

impl From<std::time::Duration> for Ttl {
    fn from(value: std::time::Duration) -> Self {
        Ttl::from_millis(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(*self))
    }
}

/// [`parse_duration`]에 넘길 수 있는 입력
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationInput<'a> {
    Number(f64),
    Text(&'a str),
}

impl<'a> From<&'a str> for DurationInput<'a> {
    fn from(value: &'a str) -> Self {
        DurationInput::Text(value)
    }
}

impl<'a> From<&'a String> for DurationInput<'a> {
    fn from(value: &'a String) -> Self {
        DurationInput::Text(value.as_str())
    }
}

impl From<u64> for DurationInput<'_> {
    fn from(value: u64) -> Self {
        DurationInput::Number(value as f64)
    }
}

impl From<u32> for DurationInput<'_> {
    fn from(value: u32) -> Self {
        DurationInput::Number(f64::from(value))
    }
}

impl From<i64> for DurationInput<'_> {
    fn from(value: i64) -> Self {
        DurationInput::Number(value as f64)
    }
}

impl From<f64> for DurationInput<'_> {
    fn from(value: f64) -> Self {
        DurationInput::Number(value)
    }
}

/// 기간 입력을 [`Ttl`]로 해석합니다.
///
/// # Arguments
///
/// * `input` - 숫자 또는 `"1h30m"` 형태의 문자열
/// * `default_unit` - 단위 없는 숫자에 적용할 단위
///
/// # Returns
///
/// 해석된 기간. 비어 있거나, 음수이거나, 알 수 없는 형식이면 [`Ttl::ZERO`].
pub fn parse_duration<'a>(input: impl Into<DurationInput<'a>>, default_unit: DurationUnit) -> Ttl {
    match input.into() {
        DurationInput::Number(value) => number_to_ttl(value, default_unit),
        DurationInput::Text(text) => parse_text(text, default_unit).unwrap_or(Ttl::ZERO),
    }
}

fn number_to_ttl(value: f64, unit: DurationUnit) -> Ttl {
    if !value.is_finite() || value <= 0.0 {
        return Ttl::ZERO;
    }
    let millis = (value * unit.millis_per_unit() as f64).ceil();
    if millis >= u64::MAX as f64 {
        return Ttl::from_millis(u64::MAX);
    }
    Ttl::from_millis(millis as u64)
}

fn parse_text(text: &str, default_unit: DurationUnit) -> Option<Ttl> {
    let text = text.trim().to_ascii_lowercase();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<f64>() {
        return Some(number_to_ttl(value, default_unit));
    }

    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut total: u64 = 0;
    while pos < bytes.len() {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos == bytes.len() {
            break;
        }

        let number_start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
            pos += 1;
        }
        if pos == number_start {
            return None;
        }
        let value: f64 = text[number_start..pos].parse().ok()?;

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let unit_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let unit = if unit_start == pos {
            default_unit
        } else {
            DurationUnit::from_suffix(&text[unit_start..pos])?
        };

        total = total.saturating_add(number_to_ttl(value, unit).millis());
    }
    Some(Ttl::from_millis(total))
}

/// [`Ttl`]을 `"2h30m"` 형태의 문자열로 변환합니다.
pub fn format_duration(ttl: Ttl) -> String {
    let mut remaining = ttl.millis();
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, suffix) in [
        (DurationUnit::Days, "d"),
        (DurationUnit::Hours, "h"),
        (DurationUnit::Minutes, "m"),
        (DurationUnit::Seconds, "s"),
        (DurationUnit::Millis, "ms"),
    ] {
        let size = unit.millis_per_unit();
        let count = remaining / size;
        if count > 0 {
            out.push_str(&format!("{}{}", count, suffix));
            remaining -= count * size;
        }
    }
    out
}

/// 밀리초를 초로 변환합니다.
pub fn ms_to_seconds(ms: u64, mode: RoundingMode) -> u64 {
    match mode {
        RoundingMode::Ceil => ms.div_ceil(1_000),
        RoundingMode::Floor => ms / 1_000,
        RoundingMode::Round => ms.saturating_add(500) / 1_000,
    }
}

pub fn seconds_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1_000)
}

/// TTL을 `[min, max]` 범위로 제한합니다.
pub fn clamp_ttl(ttl: Ttl, min: Ttl, max: Ttl) -> Ttl {
    if max < min {
        return min;
    }
    if ttl < min {
        min
    } else if ttl > max {
        max
    } else {
        ttl
    }
}

/// 절대 만료 시각(ms)까지 남은 기간. 이미 지났으면 0.
pub fn remaining_until(now_ms: i64, expires_at_ms: i64) -> Ttl {
    if expires_at_ms <= now_ms {
        Ttl::ZERO
    } else {
        Ttl::from_millis(expires_at_ms.abs_diff(now_ms))
    }
}

/// `now + ttl`의 절대 만료 시각(ms). 넘치면 `i64::MAX`로 고정됩니다.
pub fn expires_at_ms(now_ms: i64, ttl: Ttl) -> i64 {
    now_ms.saturating_add(ttl.millis_i64())
}

/// 단위 없는 원시 TTL 값을 초로 추정합니다.
///
/// 1000 이상이면 밀리초, 미만이면 초로 간주하는 레거시 규칙입니다.
/// 단위 혼동의 원인이 되므로 새 코드는 [`Ttl`]을 직접 사용해야 하며,
/// 이 함수는 기존에 저장된 설정값을 옮길 때만 씁니다.
pub fn guess_ttl_seconds(raw: f64) -> u64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    if raw >= 1_000.0 {
        number_to_ttl(raw, DurationUnit::Millis).secs()
    } else {
        number_to_ttl(raw, DurationUnit::Seconds).secs()
    }
}
