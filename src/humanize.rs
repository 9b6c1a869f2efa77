//! Human-readable byte sizes for config values and log fields

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Size out of range: {0}")]
    Overflow(String),
}

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

const UNITS: &[(&str, u64)] = &[("GB", GB), ("MB", MB), ("KB", KB)];

/// Byte count that parses from "512KB", "1.5MB" or a plain integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Largest unit with one decimal, e.g. `1.5MB`; below 1KB plain bytes
    pub fn to_human_readable(&self) -> String {
        for &(unit, divisor) in UNITS {
            if self.0 >= divisor {
                let tenths = u128::from(self.0) * 10 / u128::from(divisor);
                return if tenths % 10 == 0 {
                    format!("{}{}", tenths / 10, unit)
                } else {
                    format!("{}.{}{}", tenths / 10, tenths % 10, unit)
                };
            }
        }

        format!("{}B", self.0)
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        ByteSize(bytes)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if let Ok(num) = s.parse::<u64>() {
            return Ok(ByteSize(num));
        }

        let Some(pos) = s.find(|c: char| !c.is_ascii_digit() && c != '.') else {
            return Err(ParseError::InvalidFormat(s));
        };
        let (num_str, unit) = (&s[..pos], s[pos..].trim());

        if num_str.is_empty() {
            return Err(ParseError::InvalidFormat(s.clone()));
        }

        let multiplier = match unit {
            "B" => 1,
            "K" | "KB" | "KIB" => KB,
            "M" | "MB" | "MIB" => MB,
            "G" | "GB" | "GIB" => GB,
            "T" | "TB" | "TIB" => GB * 1024,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        let bytes = match num_str.split_once('.') {
            None => {
                let whole: u64 = num_str
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(num_str.to_string()))?;
                whole.checked_mul(multiplier)
            }
            Some((whole, fraction)) => {
                let value: f64 = format!("{}.{}", if whole.is_empty() { "0" } else { whole }, fraction)
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(num_str.to_string()))?;
                let bytes = value * multiplier as f64;
                (bytes.is_finite() && bytes < u64::MAX as f64).then(|| bytes.round() as u64)
            }
        };

        bytes.map(ByteSize).ok_or(ParseError::Overflow(s))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl<'de> serde::de::Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"8MB\", \"1.5GB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom(format!("negative byte size: {}", v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

/// Serialized as a plain integer so the value round-trips exactly
impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("1KB".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("8mb".parse::<ByteSize>().unwrap().as_u64(), 8 * MB);
        assert_eq!("2 GiB".parse::<ByteSize>().unwrap().as_u64(), 2 * GB);
        assert_eq!("10B".parse::<ByteSize>().unwrap().as_u64(), 10);
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!("1.5MB".parse::<ByteSize>().unwrap().as_u64(), MB + MB / 2);
        assert_eq!(".5KB".parse::<ByteSize>().unwrap().as_u64(), 512);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("MB".parse::<ByteSize>(), Err(ParseError::InvalidFormat(_))));
        assert!(matches!("5XB".parse::<ByteSize>(), Err(ParseError::InvalidUnit(_))));
        assert!(matches!("1.2.3MB".parse::<ByteSize>(), Err(ParseError::InvalidNumber(_))));
        assert!(matches!(
            "99999999999999TB".parse::<ByteSize>(),
            Err(ParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(ByteSize(512).to_human_readable(), "512B");
        assert_eq!(ByteSize(1024).to_human_readable(), "1KB");
        assert_eq!(ByteSize(MB + MB / 2).to_human_readable(), "1.5MB");
        assert_eq!(ByteSize(64 * MB).to_human_readable(), "64MB");
        assert_eq!(format!("{}", ByteSize(3 * GB)), "3GB");
    }

    #[test]
    fn test_deserialize() {
        #[derive(Deserialize)]
        struct Limits {
            body: ByteSize,
            header: ByteSize,
        }

        let parsed: Limits = serde_json::from_str(r#"{"body": "16MB", "header": 8192}"#).unwrap();
        assert_eq!(parsed.body, ByteSize(16 * MB));
        assert_eq!(parsed.header, ByteSize(8192));

        assert!(serde_json::from_str::<Limits>(r#"{"body": -1, "header": 1}"#).is_err());
    }

    #[test]
    fn test_serialize_as_integer() {
        assert_eq!(serde_json::to_string(&ByteSize(2048)).unwrap(), "2048");
    }
}
