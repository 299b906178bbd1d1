//! Duration string parsing: `"500"` / `"500ms"` / `"2s"` / `"1h"` -> millis.

use crate::error::CronError;

/// Parse a decimal integer (bare milliseconds) or `<int><unit>` string into
/// milliseconds, where unit is one of `ms, s, m, h, d, w`.
pub fn parse_duration(input: &str) -> Result<u64, CronError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CronError::configuration("duration string must not be empty"));
    }

    let split_at = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i);

    let (digits, unit) = match split_at {
        None => (trimmed, "ms"),
        Some(i) => (&trimmed[..i], &trimmed[i..]),
    };

    if digits.is_empty() {
        return Err(CronError::configuration(format!(
            "duration '{input}' has no numeric component"
        )));
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| CronError::configuration(format!("duration '{input}' is not a valid integer")))?;

    let multiplier: u64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        other => {
            return Err(CronError::configuration(format!(
                "duration '{input}' has unrecognized unit '{other}'"
            )));
        }
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| CronError::configuration(format!("duration '{input}' overflows u64 milliseconds")))
}
