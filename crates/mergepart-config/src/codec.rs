// Default compression codec setting
//
// Parsed from configuration strings such as "lz4", "zstd" or "zstd(3)" and
// rendered as the descriptor stored in a part's codec file.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Level used when `zstd` is configured without an explicit level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 1;

const MAX_ZSTD_LEVEL: i32 = 22;

/// Compression codec applied to column data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionCodec {
    None,
    #[default]
    Lz4,
    Zstd(i32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecParseError {
    #[error("unknown compression codec '{0}' (supported: none, lz4, zstd, zstd(<level>))")]
    Unknown(String),

    #[error("zstd level must be between 1 and {MAX_ZSTD_LEVEL}, got '{0}'")]
    InvalidLevel(String),
}

impl CompressionCodec {
    /// Textual descriptor written to `default_compression_codec.txt`.
    pub fn descriptor(&self) -> String {
        match self {
            CompressionCodec::None => "CODEC(NONE)".to_string(),
            CompressionCodec::Lz4 => "CODEC(LZ4)".to_string(),
            CompressionCodec::Zstd(level) => format!("CODEC(ZSTD({}))", level),
        }
    }
}

impl fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionCodec::None => write!(f, "none"),
            CompressionCodec::Lz4 => write!(f, "lz4"),
            CompressionCodec::Zstd(level) => write!(f, "zstd({})", level),
        }
    }
}

impl FromStr for CompressionCodec {
    type Err = CodecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "none" | "uncompressed" => return Ok(CompressionCodec::None),
            "lz4" => return Ok(CompressionCodec::Lz4),
            "zstd" => return Ok(CompressionCodec::Zstd(DEFAULT_ZSTD_LEVEL)),
            _ => {}
        }

        let Some(level) = normalized
            .strip_prefix("zstd(")
            .and_then(|rest| rest.strip_suffix(')'))
        else {
            return Err(CodecParseError::Unknown(s.to_string()));
        };

        match level.trim().parse::<i32>() {
            Ok(level) if (1..=MAX_ZSTD_LEVEL).contains(&level) => {
                Ok(CompressionCodec::Zstd(level))
            }
            _ => Err(CodecParseError::InvalidLevel(level.to_string())),
        }
    }
}

impl Serialize for CompressionCodec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CompressionCodec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
