//! Error types for the part writer

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Contract violation by the caller or an internal bug
    E001LogicalError,
    /// E002: Filesystem operation failed
    E002Io,
    /// E003: Mandatory part metadata is missing
    E003MissingMetadata,
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Arrow or Parquet encoding failed
    E005Encoding,
    /// E006: Stored part does not match its checksum ledger
    E006ChecksumMismatch,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001LogicalError => "E001",
            Self::E002Io => "E002",
            Self::E003MissingMetadata => "E003",
            Self::E004InvalidConfig => "E004",
            Self::E005Encoding => "E005",
            Self::E006ChecksumMismatch => "E006",
        }
    }
}

/// Errors that can occur while writing a part
#[derive(Debug, Error)]
pub enum PartWriterError {
    /// Structural or contract violation; never recovered
    #[error("[{code}] Logical error: {message}")]
    Logical { code: &'static str, message: String },

    /// I/O failure while touching the part directory
    #[error("[{code}] I/O error on '{}': {source}", path.display())]
    Io {
        code: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata every stored part must carry is absent
    #[error("[{code}] Missing metadata for part '{part}': {message}")]
    MissingMetadata {
        code: &'static str,
        part: String,
        message: String,
    },

    /// Invalid writer configuration
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Arrow/Parquet encoding failed
    #[error("[{code}] Encoding failed for '{context}': {message}")]
    Encoding {
        code: &'static str,
        context: String,
        message: String,
    },

    /// Verification found a file that disagrees with the ledger
    #[error("[{code}] Checksum mismatch for '{file}': {message}")]
    ChecksumMismatch {
        code: &'static str,
        file: String,
        message: String,
    },
}

impl PartWriterError {
    /// Create a logical error with error code
    pub fn logical(message: impl Into<String>) -> Self {
        Self::Logical {
            code: ErrorCode::E001LogicalError.as_str(),
            message: message.into(),
        }
    }

    /// Create an I/O error with error code
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            code: ErrorCode::E002Io.as_str(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a missing metadata error with error code
    pub fn missing_metadata(part: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingMetadata {
            code: ErrorCode::E003MissingMetadata.as_str(),
            part: part.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E004InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create an encoding error with error code
    pub fn encoding(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Encoding {
            code: ErrorCode::E005Encoding.as_str(),
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Create a checksum mismatch error with error code
    pub fn checksum_mismatch(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChecksumMismatch {
            code: ErrorCode::E006ChecksumMismatch.as_str(),
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Logical { .. } => ErrorCode::E001LogicalError,
            Self::Io { .. } => ErrorCode::E002Io,
            Self::MissingMetadata { .. } => ErrorCode::E003MissingMetadata,
            Self::InvalidConfig { .. } => ErrorCode::E004InvalidConfig,
            Self::Encoding { .. } => ErrorCode::E005Encoding,
            Self::ChecksumMismatch { .. } => ErrorCode::E006ChecksumMismatch,
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::Logical { .. })
    }
}

/// Result type alias for PartWriterError
pub type Result<T> = std::result::Result<T, PartWriterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let err = PartWriterError::logical("two writers claimed 'a.bin'");
        assert_eq!(err.code(), ErrorCode::E001LogicalError);
        assert!(err.to_string().starts_with("[E001]"));
        assert!(err.is_logical());

        let err = PartWriterError::io(
            "parts/all_1_1_0/count.txt",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(err.code(), ErrorCode::E002Io);
        assert!(err.to_string().contains("count.txt"));
        assert!(err.to_string().contains("disk full"));
    }
}
