//! In-memory implementations of the storage traits.
//!
//! Primarily for tests. Semantics match the file-backed implementations
//! but nothing survives drop.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use vault_ledger_core::{canonical_bytes, chain, ChainEntry, Cid, Codec, Sha256Digest, Value};

use crate::error::{Result, StoreError};
use crate::traits::{AppendLog, ContentStore, MirrorTarget};

/// In-memory content store. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<Cid, Bytes>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, bytes: &[u8], codec: Codec) -> Result<Cid> {
        let cid = Cid::of(codec, bytes);
        self.blobs
            .write()
            .unwrap()
            .entry(cid)
            .or_insert_with(|| Bytes::copy_from_slice(bytes));
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Option<Bytes>> {
        Ok(self.blobs.read().unwrap().get(cid).cloned())
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blobs.read().unwrap().contains_key(cid))
    }
}

/// In-memory mirror target for exercising the mirroring contract.
pub struct MemoryMirror {
    store: MemoryContentStore,
    /// When set, `store` reports this CID instead of the computed one.
    lie: Option<Cid>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self {
            store: MemoryContentStore::new(),
            lie: None,
        }
    }

    /// A mirror that reports the wrong CID, for failure-path tests.
    pub fn misbehaving(reported: Cid) -> Self {
        Self {
            store: MemoryContentStore::new(),
            lie: Some(reported),
        }
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.store.has(cid).unwrap_or(false)
    }
}

impl Default for MemoryMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorTarget for MemoryMirror {
    fn store(&self, cid: &Cid, bytes: &[u8]) -> Result<Cid> {
        let computed = self.store.put(bytes, cid.codec())?;
        Ok(self.lie.unwrap_or(computed))
    }
}

struct MemStream {
    entries: Vec<(ChainEntry, Value)>,
    quarantined: bool,
}

/// In-memory append log. Appends serialize on the write lock.
#[derive(Default)]
pub struct MemoryAppendLog {
    streams: RwLock<HashMap<String, MemStream>>,
}

impl MemoryAppendLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppendLog for MemoryAppendLog {
    fn append(&self, stream: &str, record: &Value, payload_cid: &Cid) -> Result<ChainEntry> {
        let record_bytes = canonical_bytes(record)?;
        let record_digest = Sha256Digest::hash(&record_bytes);

        let mut streams = self.streams.write().unwrap();
        let shard = streams.entry(stream.to_string()).or_insert(MemStream {
            entries: Vec::new(),
            quarantined: false,
        });
        if shard.quarantined {
            return Err(StoreError::StreamLocked {
                stream: stream.to_string(),
                reason: "quarantined pending operator reset".into(),
            });
        }

        let tip = shard.entries.last().map(|(e, _)| e);
        let seq = tip.map(|e| e.seq + 1).unwrap_or(0);
        let prev_hash = tip.map(|e| e.hash);
        let hash = chain::link(prev_hash.as_ref(), &record_digest, payload_cid, seq)?;

        let entry = ChainEntry {
            prev_hash,
            hash,
            record_digest,
            payload_cid: *payload_cid,
            seq,
            ts_ingested: now_millis(),
        };
        shard.entries.push((entry.clone(), record.clone()));
        Ok(entry)
    }

    fn tip(&self, stream: &str) -> Result<Option<ChainEntry>> {
        let streams = self.streams.read().unwrap();
        Ok(streams
            .get(stream)
            .and_then(|s| s.entries.last())
            .map(|(e, _)| e.clone()))
    }

    fn scan(
        &self,
        stream: &str,
        from_seq: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<ChainEntry>> + Send>> {
        let entries: Vec<ChainEntry> = self
            .streams
            .read()
            .unwrap()
            .get(stream)
            .map(|s| {
                s.entries
                    .iter()
                    .filter(|(e, _)| e.seq >= from_seq)
                    .map(|(e, _)| e.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn scan_records(
        &self,
        stream: &str,
        from_seq: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<(ChainEntry, Value)>> + Send>> {
        let entries: Vec<(ChainEntry, Value)> = self
            .streams
            .read()
            .unwrap()
            .get(stream)
            .map(|s| {
                s.entries
                    .iter()
                    .filter(|(e, _)| e.seq >= from_seq)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn get_record(&self, stream: &str, seq: u64) -> Result<Option<Value>> {
        let streams = self.streams.read().unwrap();
        Ok(streams.get(stream).and_then(|s| {
            s.entries
                .iter()
                .find(|(e, _)| e.seq == seq)
                .map(|(_, r)| r.clone())
        }))
    }

    fn quarantine(&self, stream: &str) -> Result<()> {
        let mut streams = self.streams.write().unwrap();
        let shard = streams.entry(stream.to_string()).or_insert(MemStream {
            entries: Vec::new(),
            quarantined: false,
        });
        shard.quarantined = true;
        Ok(())
    }

    fn reset(&self, stream: &str) -> Result<()> {
        let mut streams = self.streams.write().unwrap();
        if let Some(shard) = streams.get_mut(stream) {
            shard.quarantined = false;
        }
        Ok(())
    }

    fn is_quarantined(&self, stream: &str) -> Result<bool> {
        let streams = self.streams.read().unwrap();
        Ok(streams.get(stream).map(|s| s.quarantined).unwrap_or(false))
    }
}

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
