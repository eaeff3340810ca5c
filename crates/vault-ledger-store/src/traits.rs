//! Storage traits: the abstract interfaces the kernel builds on.
//!
//! Both traits are synchronous and thread-safe. Concurrency lives outside
//! the kernel: callers may invoke these from as many threads as they like,
//! and implementations serialize writers per stream while leaving readers
//! lock-free.

use bytes::Bytes;
use vault_ledger_core::{ChainEntry, Cid, Codec, Value};

use crate::error::Result;

/// Content-addressed payload storage.
///
/// # Design Notes
///
/// - **Idempotent puts**: storing identical bytes twice returns the same
///   CID and does not duplicate storage; concurrent identical puts collapse
///   to one stored blob.
/// - **Dumb gets**: `get` returns whatever is on the medium. Integrity is
///   the verifier's job, so tampering stays observable.
pub trait ContentStore: Send + Sync {
    /// Store payload bytes, returning their content identifier.
    fn put(&self, bytes: &[u8], codec: Codec) -> Result<Cid>;

    /// Fetch payload bytes by content identifier.
    fn get(&self, cid: &Cid) -> Result<Option<Bytes>>;

    /// Check whether a payload is present.
    fn has(&self, cid: &Cid) -> Result<bool>;
}

/// An external content-addressed store that payloads can be mirrored to.
///
/// The transport behind this trait is an adapter concern. The contract is
/// only that `store` returns the CID the external side computed, so the
/// caller can fail on disagreement.
pub trait MirrorTarget: Send + Sync {
    fn store(&self, cid: &Cid, bytes: &[u8]) -> Result<Cid>;
}

/// A durable, strictly ordered, append-only sink of chain entries.
///
/// # Contract
///
/// - `append` assigns `seq = tip.seq + 1` (or 0 at genesis), links
///   `prev_hash` to the tip, and commits entry + record atomically.
/// - Within a stream, appends are serialized; across streams they run in
///   parallel. Readers never block writers.
/// - After a crash, `tip` is always a fully committed entry: partially
///   written trailing frames are truncated on open.
/// - A quarantined stream rejects appends until an operator `reset`.
pub trait AppendLog: Send + Sync {
    /// Append a record to a stream, returning the committed entry.
    fn append(&self, stream: &str, record: &Value, payload_cid: &Cid) -> Result<ChainEntry>;

    /// The most recent committed entry, or `None` for an empty stream.
    fn tip(&self, stream: &str) -> Result<Option<ChainEntry>>;

    /// Lazily iterate committed entries from `from_seq` onward.
    fn scan(
        &self,
        stream: &str,
        from_seq: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<ChainEntry>> + Send>>;

    /// Lazily iterate committed entries with their records.
    fn scan_records(
        &self,
        stream: &str,
        from_seq: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<(ChainEntry, Value)>> + Send>>;

    /// Fetch the record appended at `seq`.
    fn get_record(&self, stream: &str, seq: u64) -> Result<Option<Value>>;

    /// Halt writers on a stream after an integrity failure.
    fn quarantine(&self, stream: &str) -> Result<()>;

    /// Operator acknowledgement: allow writes again.
    fn reset(&self, stream: &str) -> Result<()>;

    /// Whether the stream is currently quarantined.
    fn is_quarantined(&self, stream: &str) -> Result<bool>;
}
