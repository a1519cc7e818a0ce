//! Duration parsing utilities.

use anyhow::Context;

/// Parse a duration string like "2m", "30s", "30" into seconds.
/// Supports:
/// - Plain numbers (interpreted as seconds): "30"
/// - Seconds suffix: "30s"
/// - Minutes suffix: "2m"
/// - Hours suffix: "1h"
pub fn parse_duration_to_secs(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (number, unit, multiplier) = match s.char_indices().last() {
        Some((index, 'h')) => (&s[..index], "hours", 3600),
        Some((index, 'm')) => (&s[..index], "minutes", 60),
        Some((index, 's')) => (&s[..index], "seconds", 1),
        _ => (s, "duration", 1),
    };

    let value: u64 = number
        .trim()
        .parse()
        .with_context(|| format!("Invalid {unit} value: {number}"))?;
    value
        .checked_mul(multiplier)
        .with_context(|| format!("Duration too large: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration_to_secs("30").unwrap(), 30);
        assert_eq!(parse_duration_to_secs("30s").unwrap(), 30);
        assert_eq!(parse_duration_to_secs("2m").unwrap(), 120);
        assert_eq!(parse_duration_to_secs(" 1h ").unwrap(), 3600);
        assert_eq!(parse_duration_to_secs("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration_to_secs("").is_err());
        assert!(parse_duration_to_secs("-5s").is_err());
        assert!(parse_duration_to_secs("abc").is_err());

        let err = parse_duration_to_secs("xm").unwrap_err();
        assert_eq!(err.to_string(), "Invalid minutes value: x");
    }
}
