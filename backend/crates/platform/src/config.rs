//! Environment configuration helpers
//!
//! Services read their settings from process environment variables (loaded
//! from `.env` by the binaries). These helpers keep parsing and error
//! reporting uniform.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Unit assumed when a duration value has no suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Milliseconds,
    Seconds,
}

/// Read a variable. Empty values count as unset.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env_string(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Parse a variable with `FromStr`, falling back to `default` when unset.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
            reason: e.to_string(),
        }),
    }
}

pub fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

/// Parse a duration variable such as `7d`, `15m`, `30s` or `900000ms`.
pub fn env_duration(
    key: &str,
    default: Duration,
    bare_unit: DurationUnit,
) -> Result<Duration, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => parse_duration(&raw, bare_unit).map_err(|reason| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
            reason,
        }),
    }
}

/// Parse `<number><unit>` where unit is one of `ms`, `s`, `m`, `h`, `d`.
///
/// A bare number is read in `bare_unit`.
pub fn parse_duration(raw: &str, bare_unit: DurationUnit) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| "expected a number with an optional unit".to_string())?;

    let duration = match unit.trim() {
        "" => match bare_unit {
            DurationUnit::Milliseconds => Duration::from_millis(value),
            DurationUnit::Seconds => Duration::from_secs(value),
        },
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 60 * 60),
        "d" => Duration::from_secs(value * 60 * 60 * 24),
        other => return Err(format!("unknown duration unit {other:?}")),
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        let secs = DurationUnit::Seconds;
        assert_eq!(parse_duration("7d", secs), Ok(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("15m", secs), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("30s", secs), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("2h", secs), Ok(Duration::from_secs(7_200)));
        assert_eq!(
            parse_duration("900000ms", secs),
            Ok(Duration::from_millis(900_000))
        );
    }

    #[test]
    fn bare_numbers_use_the_given_unit() {
        assert_eq!(
            parse_duration("900000", DurationUnit::Milliseconds),
            Ok(Duration::from_secs(900))
        );
        assert_eq!(
            parse_duration("60", DurationUnit::Seconds),
            Ok(Duration::from_secs(60))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("", DurationUnit::Seconds).is_err());
        assert!(parse_duration("d7", DurationUnit::Seconds).is_err());
        assert!(parse_duration("7w", DurationUnit::Seconds).is_err());
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let key = "PLATFORM_CONFIG_TEST_SURELY_UNSET";
        assert_eq!(env_parse(key, 5u32), Ok(5));
        assert_eq!(env_bool(key, true), Ok(true));
        assert_eq!(
            env_duration(key, Duration::from_secs(1), DurationUnit::Seconds),
            Ok(Duration::from_secs(1))
        );
        assert_eq!(
            env_required(key),
            Err(ConfigError::Missing(key.to_string()))
        );
    }
}
