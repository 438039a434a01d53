//! Error types for Playdeck Core

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Controller error types
#[derive(Error, Debug)]
pub enum Error {
    // Source resolution errors
    #[error("Failed to fetch stream metadata: {0}")]
    MetadataFetch(String),

    #[error("Failed to parse stream metadata: {0}")]
    MetadataParse(String),

    #[error("Metadata request timed out after {timeout_ms} ms")]
    MetadataTimeout { timeout_ms: u64 },

    #[error("Invalid stream list: {0}")]
    InvalidStreamList(String),

    #[error("No viable video source")]
    NoViableSource,

    #[error("Codec probe failed for {mime}: {reason}")]
    CodecProbe { mime: String, reason: String },

    // Persistence errors
    #[error("Preference store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the hosted path can still be attempted after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MetadataFetch(_)
                | Error::MetadataParse(_)
                | Error::MetadataTimeout { .. }
                | Error::Network(_)
                | Error::CodecProbe { .. }
        )
    }

    /// Returns the error code written to logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MetadataFetch(_) => "METADATA_FETCH",
            Error::MetadataParse(_) => "METADATA_PARSE",
            Error::MetadataTimeout { .. } => "METADATA_TIMEOUT",
            Error::InvalidStreamList(_) => "INVALID_STREAMS",
            Error::NoViableSource => "NO_SOURCE",
            Error::CodecProbe { .. } => "CODEC_PROBE",
            Error::Store(_) => "STORE",
            Error::Serde(_) => "SERDE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Network(_) => "NETWORK",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_recoverable() {
        let err = Error::MetadataTimeout { timeout_ms: 1500 };
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "METADATA_TIMEOUT");
        assert_eq!(err.to_string(), "Metadata request timed out after 1500 ms");
    }

    #[test]
    fn test_no_source_is_terminal() {
        assert!(!Error::NoViableSource.is_recoverable());
    }
}
