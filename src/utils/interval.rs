//! Duration literals such as `10m`, `1h`, `1d` or `1h30m`.

use chrono::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval is empty")]
    Empty,

    #[error("interval '{0}' is missing a unit (s, m, h, d, w)")]
    MissingUnit(String),

    #[error("interval '{literal}' has unknown unit '{unit}'")]
    UnknownUnit { literal: String, unit: char },

    #[error("interval '{0}' is too large")]
    Overflow(String),
}

pub fn parse_interval(literal: &str) -> Result<Duration, IntervalError> {
    let literal = literal.trim();
    if literal.is_empty() {
        return Err(IntervalError::Empty);
    }

    let mut total_secs: i64 = 0;
    let mut digits = String::new();

    for ch in literal.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let unit_secs = match ch {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            'w' => 604_800,
            other => {
                return Err(IntervalError::UnknownUnit {
                    literal: literal.to_string(),
                    unit: other,
                })
            }
        };
        if digits.is_empty() {
            return Err(IntervalError::MissingUnit(literal.to_string()));
        }

        let amount: i64 = digits
            .parse()
            .map_err(|_| IntervalError::Overflow(literal.to_string()))?;
        total_secs = amount
            .checked_mul(unit_secs)
            .and_then(|secs| total_secs.checked_add(secs))
            .ok_or_else(|| IntervalError::Overflow(literal.to_string()))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(IntervalError::MissingUnit(literal.to_string()));
    }

    Duration::try_seconds(total_secs).ok_or_else(|| IntervalError::Overflow(literal.to_string()))
}

/// Inverse of `parse_interval`, using the largest units that divide evenly.
pub fn format_interval(interval: Duration) -> String {
    let mut secs = interval.num_seconds();
    if secs <= 0 {
        return format!("{secs}s");
    }

    let mut out = String::new();
    for (unit, size) in [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)] {
        if secs >= size {
            out.push_str(&format!("{}{unit}", secs / size));
            secs %= size;
        }
    }
    out
}
