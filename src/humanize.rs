//! Byte sizes written the way people write them ("10MB", "512 KiB")

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty size")]
    Empty,

    #[error("invalid number in size: {0}")]
    InvalidNumber(String),

    #[error("unknown size unit: {0}")]
    InvalidUnit(String),

    #[error("size out of range: {0}")]
    Overflow(String),
}

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Size in bytes. Parses from an integer or a decimal with a binary unit
/// suffix; renders with the largest unit that keeps a whole or one-decimal
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn mib(n: u64) -> Self {
        ByteSize(n * MIB)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit {
        "" | "B" => Some(1),
        "K" | "KB" | "KIB" => Some(KIB),
        "M" | "MB" | "MIB" => Some(MIB),
        "G" | "GB" | "GIB" => Some(GIB),
        _ => None,
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(split);
        let unit = unit.trim().to_ascii_uppercase();

        let multiplier =
            unit_multiplier(&unit).ok_or_else(|| ParseError::InvalidUnit(unit.clone()))?;

        let bytes = match number.split_once('.') {
            None => number
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidNumber(number.to_string()))?
                .checked_mul(multiplier)
                .ok_or_else(|| ParseError::Overflow(s.to_string()))?,
            Some(_) => {
                let value = number
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber(number.to_string()))?;
                let bytes = value * multiplier as f64;
                if !bytes.is_finite() || bytes >= u64::MAX as f64 {
                    return Err(ParseError::Overflow(s.to_string()));
                }
                bytes.round() as u64
            }
        };

        Ok(ByteSize(bytes))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, divisor) = match self.0 {
            n if n >= GIB => ("GB", GIB),
            n if n >= MIB => ("MB", MIB),
            n if n >= KIB => ("KB", KIB),
            _ => return write!(f, "{}B", self.0),
        };

        let whole = self.0 / divisor;
        let tenths = (self.0 % divisor) * 10 / divisor;
        if tenths == 0 {
            write!(f, "{whole}{unit}")
        } else {
            write!(f, "{whole}.{tenths}{unit}")
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bytes(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("2048".parse::<ByteSize>().unwrap(), ByteSize(2048));
        assert_eq!("1KB".parse::<ByteSize>().unwrap(), ByteSize(1024));
        assert_eq!("10MB".parse::<ByteSize>().unwrap(), ByteSize::mib(10));
        assert_eq!("10 mib".parse::<ByteSize>().unwrap(), ByteSize::mib(10));
        assert_eq!("1.5M".parse::<ByteSize>().unwrap(), ByteSize(MIB + MIB / 2));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<ByteSize>(), Err(ParseError::Empty));
        assert!(matches!("10XB".parse::<ByteSize>(), Err(ParseError::InvalidUnit(_))));
        assert!(matches!("MB".parse::<ByteSize>(), Err(ParseError::InvalidNumber(_))));
        assert!(matches!(
            "99999999999999GB".parse::<ByteSize>(),
            Err(ParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteSize(512).to_string(), "512B");
        assert_eq!(ByteSize::mib(10).to_string(), "10MB");
        assert_eq!(ByteSize(MIB + MIB / 2).to_string(), "1.5MB");
    }

    #[test]
    fn test_deserialize_from_config_values() {
        #[derive(Deserialize)]
        struct Limits {
            a: ByteSize,
            b: ByteSize,
        }

        let limits: Limits = toml::from_str("a = \"10MB\"\nb = 4096").unwrap();
        assert_eq!(limits.a, ByteSize::mib(10));
        assert_eq!(limits.b, ByteSize(4096));
    }
}
