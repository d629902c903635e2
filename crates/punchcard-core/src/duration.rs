//! Human duration strings: `1h30m`, `45s`, `12m 30s` and `H:MM`.

use chrono::Duration;

use crate::error::ValidationError;

fn invalid(input: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: format!("duration '{input}'"),
        message: message.into(),
    }
}

/// Parse a duration string.
///
/// Unit form accepts `h`, `m` and `s` suffixes, optionally separated by
/// whitespace. Clock form `H:MM` (or `H:MM:SS`) is hours and minutes.
///
/// # Errors
///
/// [`ValidationError::InvalidValue`] for empty, negative or malformed input.
pub fn parse_duration(input: &str) -> Result<Duration, ValidationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid(input, "empty duration"));
    }
    if s.contains(':') {
        return parse_clock(input, s);
    }

    let mut total = Duration::zero();
    let mut number = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        if ch.is_whitespace() {
            continue;
        }
        if number.is_empty() {
            return Err(invalid(input, "expected number before unit"));
        }
        let value: i64 = number
            .parse()
            .map_err(|_| invalid(input, format!("invalid number '{number}'")))?;
        let part = match ch {
            'h' => Duration::try_hours(value),
            'm' => Duration::try_minutes(value),
            's' => Duration::try_seconds(value),
            other => return Err(invalid(input, format!("unknown unit '{other}'"))),
        }
        .ok_or_else(|| invalid(input, "duration out of range"))?;
        total += part;
        number.clear();
    }
    if !number.is_empty() {
        return Err(invalid(input, "missing unit after number"));
    }
    Ok(total)
}

fn parse_clock(input: &str, s: &str) -> Result<Duration, ValidationError> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(invalid(input, "expected H:MM"));
    }
    let mut numbers = Vec::with_capacity(parts.len());
    for part in &parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(input, "expected H:MM"));
        }
        let value: i64 = part
            .parse()
            .map_err(|_| invalid(input, format!("invalid number '{part}'")))?;
        numbers.push(value);
    }
    if numbers[1..].iter().any(|n| *n >= 60) {
        return Err(invalid(input, "minutes and seconds must be below 60"));
    }
    let seconds = numbers.get(2).copied().unwrap_or(0);
    Duration::try_hours(numbers[0])
        .zip(Duration::try_minutes(numbers[1]))
        .map(|(h, m)| h + m + Duration::seconds(seconds))
        .ok_or_else(|| invalid(input, "duration out of range"))
}

/// `1h 30m`, `45s`, `0s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.unsigned_abs();
    let components = [(total / 3600, "h"), ((total % 3600) / 60, "m"), (total % 60, "s")];
    let parts: Vec<String> = components
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, suffix)| format!("{value}{suffix}"))
        .collect();
    if parts.is_empty() {
        return "0s".to_string();
    }
    format!("{sign}{}", parts.join(" "))
}
