//! # Vault Ledger
//!
//! Deterministic, content-addressed ledger with cryptographic anchoring.
//!
//! The service layer over [`vault_ledger_core`] and [`vault_ledger_store`]:
//!
//! - [`Vault`] - the facade adapters build on (HTTP, CLI, MCP, SDK)
//! - [`AnchorService`] - the write-anchor protocol: validate, deduplicate,
//!   sign, persist, return a sealed receipt
//! - [`CheckpointEngine`] - canonical state capsules linked by parent CID
//! - [`ReplayVerifier`] - offline chain, capsule, and receipt verification
//!
//! ## Guarantees
//!
//! 1. Same records in, same chain out: hashes cover canonical bytes only,
//!    never wall clocks or host identity.
//! 2. A returned receipt means canonicalize, sign, append, and fsync all
//!    completed.
//! 3. Integrity failures quarantine the stream; nothing is auto-repaired.

pub mod anchor;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod vault;
pub mod verify;

pub use anchor::{
    AnchorReceipt, AnchorRequest, AnchorService, ANCHOR_RECEIPT_SCHEMA, ANCHOR_REQUEST_SCHEMA,
    LEDGER_LINE_SCHEMA,
};
pub use checkpoint::{CheckpointEngine, Snapshot, CAPSULE_SCHEMA};
pub use config::{AnchorConfig, CheckpointConfig, ContentConfig, KeySource, SeqEnforce, VaultConfig};
pub use error::VaultError;
pub use vault::Vault;
pub use verify::{
    verify_receipt, Defect, EntryVerdict, ReceiptDefect, ReplayProducer, ReplayVerifier,
    StreamReport,
};

pub use vault_ledger_core::{
    canonical_bytes, parse_canonical, ChainEntry, Cid, Codec, Sha256Digest, SignatureBytes, Value,
    VaultKeypair, VaultPublicKey,
};
pub use vault_ledger_store::{
    AppendLog, ContentStore, DirContentStore, FileAppendLog, KeyArchive, MemoryAppendLog,
    MemoryContentStore, MirrorTarget,
};
