//! Error types for the storage layer.

use thiserror::Error;
use vault_ledger_core::CanonicalError;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer holds the stream lock, or the stream is quarantined
    /// pending an operator reset.
    #[error("stream '{stream}' is locked: {reason}")]
    StreamLocked { stream: String, reason: String },

    /// A committed frame failed its checksum or could not be decoded.
    #[error("corrupt entry in stream '{stream}' at byte {offset}: {reason}")]
    CorruptEntry {
        stream: String,
        offset: u64,
        reason: String,
    },

    /// A mirror returned a different content identifier than the local
    /// store computed for the same bytes.
    #[error("cid mismatch: local {local}, mirror returned {remote}")]
    CidMismatch { local: String, remote: String },

    #[error("invalid stream name '{0}'")]
    InvalidStreamName(String),

    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
