//! Relative Duration Parsing
//!
//! Block expirations are written as a number plus a one-letter unit ("15m",
//! "2h", "1d") or a bare count of seconds ("30"). The parsed value stays a
//! relative offset; the planner binds it into `NOW() + seconds` so the
//! expiration is computed against the database clock, not the client clock.

use crate::error::{RadctlError, Result};

/// Parse a relative duration into whole seconds
///
/// Absent or blank input means "no expiration" and yields `Ok(None)`.
/// Units: `s` seconds, `m` minutes, `h` hours, `d` days; a trailing digit
/// means the whole value is already in seconds. Case-insensitive.
pub fn parse_duration(raw: Option<&str>) -> Result<Option<i64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let text = raw.trim().to_ascii_lowercase();
    if text.is_empty() {
        return Ok(None);
    }

    let Some(unit) = text.chars().last() else {
        return Ok(None);
    };
    let (number, multiplier) = if unit.is_ascii_digit() {
        (text.as_str(), 1i64)
    } else {
        let multiplier = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            _ => {
                return Err(RadctlError::invalid_duration(format!(
                    "unknown duration unit in {raw:?} (use s/m/h/d)"
                )))
            }
        };
        // The matched unit is ASCII, so the byte before it is a char boundary.
        (&text[..text.len() - 1], multiplier)
    };

    let value: i64 = number
        .parse()
        .map_err(|_| RadctlError::invalid_duration(format!("invalid duration {raw:?}")))?;
    if value < 0 {
        return Err(RadctlError::invalid_duration(format!(
            "duration must be >= 0, got {raw:?}"
        )));
    }
    value
        .checked_mul(multiplier)
        .map(Some)
        .ok_or_else(|| RadctlError::invalid_duration(format!("duration out of range: {raw:?}")))
}
