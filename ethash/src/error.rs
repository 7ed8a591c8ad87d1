//! Error taxonomy for the Ethash core
//!
//! Only caller-input problems and resource exhaustion are errors. A proof that
//! fails verification is a valid `Ok(false)`, never an `Err`.

use thiserror::Error;

/// Errors reported by the Ethash core
#[derive(Debug, Error)]
pub enum EthashError {
    /// A fixed-size digest argument had the wrong length
    #[error("{field} must have length of {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A hex-encoded argument could not be decoded
    #[error("invalid hex for {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    /// A light cache or dataset cannot have this many items
    #[error("invalid {what} item count: {count}")]
    InvalidItemCount { what: &'static str, count: u64 },

    /// Light cache or dataset allocation failed
    #[error("failed to allocate {bytes} bytes for {what}")]
    Allocation { what: &'static str, bytes: u64 },

    /// Eager dataset build abandoned before completion
    #[error("dataset build for epoch {epoch} was cancelled")]
    Cancelled { epoch: u64 },

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),

    /// Worker pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl EthashError {
    /// True for errors caused by the caller's arguments (recoverable by fixing input)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidLength { .. } | Self::InvalidHex { .. } | Self::InvalidItemCount { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EthashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_length_message() {
        let err = EthashError::InvalidLength {
            field: "header_hash",
            expected: 32,
            actual: 31,
        };
        assert_eq!(err.to_string(), "header_hash must have length of 32 bytes, got 31");
        assert!(err.is_input_error());
    }

    #[test]
    fn test_resource_errors_are_not_input_errors() {
        let err = EthashError::Allocation { what: "light cache", bytes: 1 << 40 };
        assert!(!err.is_input_error());
        assert!(!EthashError::Cancelled { epoch: 3 }.is_input_error());
    }

    #[test]
    fn test_item_count_message() {
        let err = EthashError::InvalidItemCount { what: "full dataset", count: 0 };
        assert_eq!(err.to_string(), "invalid full dataset item count: 0");
        assert!(err.is_input_error());
    }
}
