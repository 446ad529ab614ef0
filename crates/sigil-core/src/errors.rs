//! Unified error system for Sigil
//!
//! Public operations surface a single error enum. Internal layers keep
//! their own error types (codec, store, verifier) and convert into this
//! taxonomy at the API boundary, so callers never see layer-private kinds.

use serde::{Deserialize, Serialize};

/// Unified error type surfaced by Sigil public operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum SigilError {
    /// A block failed verification
    #[error("Invalid block: {message}")]
    InvalidBlock {
        /// Which rule failed, and for which block nature
        message: String,
    },

    /// The server sent a block version or nature this build does not know
    #[error("Upgrade required: {message}")]
    UpgradeRequired {
        /// What was not understood
        message: String,
    },

    /// The operation is not valid in the current state
    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        /// Which precondition was violated
        message: String,
    },

    /// Malformed input to a public operation
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was malformed
        message: String,
    },

    /// An identity verification was rejected
    #[error("Invalid verification: {message}")]
    InvalidVerification {
        /// Why the verification was rejected
        message: String,
    },

    /// A sealed or symmetric decryption failed
    #[error("Decryption failed: {message}")]
    DecryptionFailed {
        /// Which decryption failed
        message: String,
    },

    /// A second caller raced an in-flight session mutation
    #[error("Busy: {message}")]
    Busy {
        /// Which operation was in flight
        message: String,
    },

    /// A requested record or entity does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// What was missing
        message: String,
    },

    /// Transport error from the external network client
    #[error("Network error: {message}")]
    Network {
        /// Error reported by the client
        message: String,
    },

    /// The underlying record store failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error reported by the store
        message: String,
    },

    /// Invariant violation; the session should halt
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

impl SigilError {
    /// Create an invalid-block error
    pub fn invalid_block(message: impl Into<String>) -> Self {
        Self::InvalidBlock {
            message: message.into(),
        }
    }

    /// Create an upgrade-required error
    pub fn upgrade_required(message: impl Into<String>) -> Self {
        Self::UpgradeRequired {
            message: message.into(),
        }
    }

    /// Create a precondition-failed error
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid-verification error
    pub fn invalid_verification(message: impl Into<String>) -> Self {
        Self::InvalidVerification {
            message: message.into(),
        }
    }

    /// Create a decryption-failed error
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Create a busy error
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidBlock { .. } => "invalid_block",
            Self::UpgradeRequired { .. } => "upgrade_required",
            Self::PreconditionFailed { .. } => "precondition_failed",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::InvalidVerification { .. } => "invalid_verification",
            Self::DecryptionFailed { .. } => "decryption_failed",
            Self::Busy { .. } => "busy",
            Self::NotFound { .. } => "not_found",
            Self::Network { .. } => "network",
            Self::Storage { .. } => "storage",
            Self::Internal { .. } => "internal",
        }
    }

    /// Whether the caller can meaningfully retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Storage { .. } | Self::Busy { .. }
        )
    }
}

/// Standard Result type for Sigil operations
pub type Result<T> = std::result::Result<T, SigilError>;

impl From<crate::serialize::CodecError> for SigilError {
    fn from(err: crate::serialize::CodecError) -> Self {
        use crate::serialize::CodecError;
        match err {
            CodecError::UnknownNature(_) | CodecError::UpgradeRequired(_) => {
                Self::upgrade_required(err.to_string())
            }
            _ => Self::invalid_argument(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SigilError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SigilError::invalid_argument("bad token");
        assert!(matches!(err, SigilError::InvalidArgument { .. }));
        assert_eq!(err.to_string(), "Invalid argument: bad token");
        assert_eq!(err.category(), "invalid_argument");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SigilError::busy("refresh in flight").is_retryable());
        assert!(SigilError::network("timeout").is_retryable());
        assert!(!SigilError::invalid_block("bad signature").is_retryable());
    }

    #[test]
    fn test_codec_error_conversion() {
        use crate::serialize::CodecError;
        let err = SigilError::from(CodecError::UnknownNature(5));
        assert!(matches!(err, SigilError::UpgradeRequired { .. }));
        let err = SigilError::from(CodecError::Truncated);
        assert!(matches!(err, SigilError::InvalidArgument { .. }));
    }
}
