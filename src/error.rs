use std::time::Duration;

use thiserror::Error;

use crate::keys::Domain;
use crate::prover::StatusCode;
use crate::round::RoundKind;

/// Errors raised by the proof engine and the round coordinator.
#[derive(Debug, Error)]
pub enum PdpError {
    /// The partition policy cannot be satisfied by the file.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// A challenge names a block the tag or matrix does not have.
    #[error("challenge index {index} out of range for {len} blocks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("tag verification failed: {0}")]
    TagVerificationFailed(String),

    /// Values from two different algebraic domains were combined.
    #[error("domain mismatch: expected {expected}, found {found}")]
    DomainMismatch { expected: Domain, found: Domain },

    #[error("proof computation made no progress within {0:?}")]
    Timeout(Duration),

    #[error("verifier transport error: {0}")]
    Transport(String),

    #[error("{0} challenge round already in progress")]
    RoundActive(RoundKind),

    #[error("secret key not available")]
    MissingSecretKey,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PdpError>;

impl PdpError {
    /// Status code reported for a failed proof computation.
    pub fn status(&self) -> StatusCode {
        match self {
            PdpError::Timeout(_) => StatusCode::NoProgress,
            PdpError::IndexOutOfRange { .. }
            | PdpError::TagVerificationFailed(_)
            | PdpError::InvalidSize(_) => StatusCode::ErrorParam,
            _ => StatusCode::ErrorInternal,
        }
    }

    /// Whether the failure only concerns the file being proved. File-local
    /// failures skip the file; everything else ends the round.
    pub fn is_file_local(&self) -> bool {
        !matches!(
            self,
            PdpError::DomainMismatch { .. }
                | PdpError::RoundActive(_)
                | PdpError::Transport(_)
                | PdpError::MissingSecretKey
                | PdpError::InvalidKey(_)
                | PdpError::Config(_)
        )
    }
}

impl From<hex::FromHexError> for PdpError {
    fn from(e: hex::FromHexError) -> Self {
        PdpError::Encoding(e.to_string())
    }
}

impl From<serde_json::Error> for PdpError {
    fn from(e: serde_json::Error) -> Self {
        PdpError::Encoding(e.to_string())
    }
}

impl From<toml::de::Error> for PdpError {
    fn from(e: toml::de::Error) -> Self {
        PdpError::Config(e.to_string())
    }
}
