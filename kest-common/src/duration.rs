//! Go-like duration strings with millisecond resolution.
//!
//! Accepts concatenated `<n>[.<frac>]<unit>` segments with unit one of
//! `ms`, `s`, `m`, `h` (`"5s"`, `"200ms"`, `"1h30m"`). The bare string
//! `"0"` is the zero duration. Anything else — whitespace, signs, unknown
//! units like `ns` or `day` — is rejected. Values parse to integer
//! milliseconds, truncating toward zero below millisecond precision, and
//! render back in compound form (`90061ms` → `"1m30.061s"`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A duration string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct InvalidDuration {
    pub input: String,
    pub reason: String,
}

impl InvalidDuration {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A duration in whole milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DurationMs(u64);

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

impl DurationMs {
    pub const ZERO: DurationMs = DurationMs(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn to_std(self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Parse a duration string (`"5s"`, `"200ms"`, `"1h30m"`, `"0"`).
    pub fn parse(input: &str) -> Result<Self, InvalidDuration> {
        if input == "0" {
            return Ok(Self::ZERO);
        }
        if input.is_empty() {
            return Err(InvalidDuration::new(input, "empty string"));
        }

        let bytes = input.as_bytes();
        let mut pos = 0;
        let mut total: u64 = 0;

        while pos < bytes.len() {
            let int_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos == int_start {
                return Err(InvalidDuration::new(
                    input,
                    format!("expected a number at offset {int_start}"),
                ));
            }
            let int_part: u64 = input[int_start..pos]
                .parse()
                .map_err(|_| InvalidDuration::new(input, "number out of range"))?;

            let mut frac_digits: &str = "";
            if pos < bytes.len() && bytes[pos] == b'.' {
                pos += 1;
                let frac_start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                if pos == frac_start {
                    return Err(InvalidDuration::new(input, "missing fraction digits"));
                }
                frac_digits = &input[frac_start..pos];
            }

            let unit_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
                pos += 1;
            }
            let unit = &input[unit_start..pos];
            let unit_ms = match unit {
                "ms" => 1,
                "s" => MS_PER_SECOND,
                "m" => MS_PER_MINUTE,
                "h" => MS_PER_HOUR,
                "" => return Err(InvalidDuration::new(input, "missing unit")),
                other => {
                    return Err(InvalidDuration::new(input, format!("unknown unit {other:?}")))
                }
            };

            let mut segment = int_part
                .checked_mul(unit_ms)
                .ok_or_else(|| InvalidDuration::new(input, "value overflows"))?;

            if !frac_digits.is_empty() {
                // Truncate toward zero below millisecond precision.
                let frac_value: u128 = frac_digits
                    .parse()
                    .map_err(|_| InvalidDuration::new(input, "fraction out of range"))?;
                let scale = 10u128.pow(frac_digits.len() as u32);
                let frac_ms = (frac_value * unit_ms as u128) / scale;
                segment = segment
                    .checked_add(frac_ms as u64)
                    .ok_or_else(|| InvalidDuration::new(input, "value overflows"))?;
            }

            total = total
                .checked_add(segment)
                .ok_or_else(|| InvalidDuration::new(input, "value overflows"))?;
        }

        Ok(Self(total))
    }
}

impl fmt::Display for DurationMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0;
        if total == 0 {
            return write!(f, "0s");
        }
        if total < MS_PER_SECOND {
            return write!(f, "{total}ms");
        }

        let hours = total / MS_PER_HOUR;
        let minutes = (total % MS_PER_HOUR) / MS_PER_MINUTE;
        let seconds = (total % MS_PER_MINUTE) / MS_PER_SECOND;
        let millis = total % MS_PER_SECOND;

        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        if seconds > 0 || millis > 0 {
            if millis > 0 {
                let frac = format!("{millis:03}");
                write!(f, "{seconds}.{}s", frac.trim_end_matches('0'))?;
            } else {
                write!(f, "{seconds}s")?;
            }
        }
        Ok(())
    }
}

impl FromStr for DurationMs {
    type Err = InvalidDuration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        d.to_std()
    }
}
