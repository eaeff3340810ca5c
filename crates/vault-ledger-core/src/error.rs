//! Error types for the vault ledger core.

use thiserror::Error;

/// Errors from the canonical encoder.
///
/// Canonicalization failures never mutate state; the offending record is
/// simply rejected.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// A float, non-finite number, or out-of-range integer reached the
    /// hash domain. Producers must pre-quantize to integers.
    #[error("invalid scalar in hash domain: {0}")]
    InvalidScalar(String),

    /// The same key appeared twice in one map.
    #[error("duplicate map key: {0:?}")]
    DuplicateKey(String),

    /// A map key was not a text value.
    #[error("map key is not a string")]
    NonStringKey,

    /// Nesting exceeded the recursion bound. Owned trees cannot alias, so
    /// hitting the bound means a producer adapter manufactured a cycle.
    #[error("cycle detected: record nesting exceeds the recursion bound")]
    CycleDetected,

    /// Input bytes were not parseable as a canonical record.
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Errors from digests, keys, signatures, and CIDs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("signing key not loaded or already zeroized")]
    KeyUnavailable,

    #[error("malformed digest: {0}")]
    MalformedDigest(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("malformed cid: {0}")]
    MalformedCid(String),
}
