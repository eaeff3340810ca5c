//! # Vault Ledger Store
//!
//! Storage backends for the vault ledger.
//!
//! The kernel talks to two abstractions:
//!
//! - [`ContentStore`] - put/get payload bytes by content identifier
//! - [`AppendLog`] - durable, ordered, append-only chain of records
//!
//! Implementations:
//!
//! - [`MemoryContentStore`] / [`MemoryAppendLog`] - for tests
//! - [`DirContentStore`] - one blob per hex digest, atomic publication
//! - [`FileAppendLog`] - one CRC-framed log file per stream with torn-tail
//!   recovery, per-stream write locks, and optional fsync-per-append
//!
//! Plus [`KeyArchive`], the long-term `fingerprint -> public key` map used
//! to verify receipts across key rotations.

pub mod content;
pub mod error;
pub mod keys;
pub mod log_file;
pub mod memory;
pub mod traits;

pub use content::DirContentStore;
pub use error::{Result, StoreError};
pub use keys::KeyArchive;
pub use log_file::FileAppendLog;
pub use memory::{MemoryAppendLog, MemoryContentStore, MemoryMirror};
pub use traits::{AppendLog, ContentStore, MirrorTarget};
