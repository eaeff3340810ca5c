//! # Vault Ledger Core
//!
//! Pure primitives for the vault ledger: records, canonical bytes, digests,
//! content identifiers, Ed25519 signing, and Merkle chain links.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Value`] - A record tree (null, bool, integer, text, array, map)
//! - [`Sha256Digest`] - 32-byte digest, lowercase hex at boundaries
//! - [`Cid`] - Content identifier (codec tag + SHA-256 multihash)
//! - [`ChainEntry`] - One link of an append-only hash chain
//! - [`VaultKeypair`] - Ed25519 signing identity
//!
//! ## Canonicalization
//!
//! All hashed and signed bytes go through [`canonical_bytes`]: a JCS-subset
//! JSON encoding with sorted keys and integer-only scalars. See the
//! [`canonical`] module.

pub mod canonical;
pub mod chain;
pub mod cid;
pub mod crypto;
pub mod error;
pub mod value;

pub use canonical::{canonical_bytes, parse_canonical, MAX_DEPTH};
pub use chain::{link, verify_pair, ChainDefect, ChainEntry};
pub use cid::{Cid, Codec};
pub use crypto::{Sha256Digest, SignatureBytes, VaultKeypair, VaultPublicKey};
pub use error::{CanonicalError, CoreError};
pub use value::Value;
