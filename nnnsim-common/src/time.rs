//! Duration strings in the `50ms` / `2s` / `1min` style used by configuration.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("ms", 1e6),
    ("min", 60e9),
    ("h", 3600e9),
    ("s", 1e9),
];

/// Parses a duration such as `"50ms"`, `"2s"`, `"1.5s"` or `"1min"`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, Error> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::Config("empty duration".into()));
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| Error::Config(format!("invalid duration '{}'", input)))?;

    let scale = if unit.is_empty() {
        1e9
    } else {
        UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| Error::Config(format!("unknown duration unit '{}' in '{}'", unit, input)))?
    };

    Ok(Duration::from_nanos((value * scale).round() as u64))
}

/// Formats a duration using the largest unit that keeps it integral.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0s".to_string()
    } else if nanos % 1_000_000_000 == 0 {
        format!("{}s", nanos / 1_000_000_000)
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!("{}us", nanos / 1_000)
    } else {
        format!("{}ns", nanos)
    }
}

/// Serde adapter for `Duration` fields written as duration strings.
pub mod serde_duration {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(f64),
    }

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
            Raw::Seconds(secs) if secs >= 0.0 => Ok(Duration::from_secs_f64(secs)),
            Raw::Seconds(secs) => Err(serde::de::Error::custom(format!("negative duration {}", secs))),
        }
    }
}

/// Same as [`serde_duration`] for optional fields.
pub mod serde_opt_duration {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&format_duration(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|text| parse_duration(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
