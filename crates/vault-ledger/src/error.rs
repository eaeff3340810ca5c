//! Service-level errors and their transport mapping.
//!
//! Errors are values with a stable kind; adapters translate kinds to their
//! transport's status codes via [`VaultError::http_status`]. No state
//! changes on any validation or semantic error.

use thiserror::Error;
use vault_ledger_core::{CanonicalError, CoreError};
use vault_ledger_store::StoreError;

/// Errors surfaced by the vault service operations.
#[derive(Debug, Error)]
pub enum VaultError {
    // Validation: rejected before touching state.
    #[error("unsupported schema_version: {0:?}")]
    InvalidSchemaVersion(String),

    #[error("payload_hash_sha256 must be exactly 64 lowercase hex characters")]
    InvalidPayloadHash,

    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("ts is not ISO-8601 UTC with Z suffix: {0:?}")]
    InvalidTimestamp(String),

    // Semantic: well-formed but not acceptable.
    #[error("payload hash already anchored in this stream: {0}")]
    DuplicateAnchor(String),

    #[error("checkpoint tick {tick} out of order for stream '{stream}' (last was {last})")]
    CheckpointOutOfOrder {
        stream: String,
        tick: u64,
        last: u64,
    },

    #[error("producer state rejected by canonicalizer: {0}")]
    ProducerStateNonCanonical(CanonicalError),

    #[error("cid mismatch: local {local}, mirror returned {remote}")]
    CidMismatch { local: String, remote: String },

    #[error("canonicalization failed: {0}")]
    CanonicalizationFailed(#[from] CanonicalError),

    // Infrastructure: transient, adapters may retry (signing is never
    // retried by the core).
    #[error("vault key not loaded or already zeroized")]
    KeyUnavailable,

    #[error("stream '{stream}' is locked: {reason}")]
    StreamLocked { stream: String, reason: String },

    #[error("corrupt entry: {0}")]
    CorruptEntry(String),

    #[error("deadline expired before the write lock was acquired")]
    Timeout,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl VaultError {
    /// The HTTP status an adapter should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            VaultError::InvalidSchemaVersion(_)
            | VaultError::InvalidPayloadHash
            | VaultError::MissingRequiredField(_)
            | VaultError::InvalidTimestamp(_) => 400,

            VaultError::DuplicateAnchor(_) | VaultError::CheckpointOutOfOrder { .. } => 409,

            VaultError::CanonicalizationFailed(_) | VaultError::ProducerStateNonCanonical(_) => 422,

            VaultError::KeyUnavailable => 500,

            VaultError::CidMismatch { .. } => 502,

            VaultError::StreamLocked { .. }
            | VaultError::CorruptEntry(_)
            | VaultError::Timeout
            | VaultError::StorageError(_) => 503,

            VaultError::Core(_) => 500,
        }
    }
}

impl From<StoreError> for VaultError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StreamLocked { stream, reason } => {
                VaultError::StreamLocked { stream, reason }
            }
            StoreError::CorruptEntry { .. } => VaultError::CorruptEntry(e.to_string()),
            StoreError::CidMismatch { local, remote } => VaultError::CidMismatch { local, remote },
            StoreError::Canonical(inner) => VaultError::CanonicalizationFailed(inner),
            StoreError::InvalidStreamName(_) | StoreError::Encoding(_) => {
                VaultError::StorageError(e.to_string())
            }
            StoreError::Storage(_) => VaultError::StorageError(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_mapping() {
        assert_eq!(
            VaultError::InvalidSchemaVersion("x".into()).http_status(),
            400
        );
        assert_eq!(VaultError::InvalidPayloadHash.http_status(), 400);
        assert_eq!(VaultError::MissingRequiredField("ts").http_status(), 400);
        assert_eq!(VaultError::InvalidTimestamp("x".into()).http_status(), 400);
        assert_eq!(VaultError::DuplicateAnchor("h".into()).http_status(), 409);
        assert_eq!(
            VaultError::CanonicalizationFailed(CanonicalError::NonStringKey).http_status(),
            422
        );
        assert_eq!(VaultError::KeyUnavailable.http_status(), 500);
        assert_eq!(VaultError::StorageError("down".into()).http_status(), 503);
    }
}
