//! Checkpoint capsules: canonical snapshots of producer state, linked into
//! a per-stream chain by parent CID.
//!
//! Producers hand over state already stripped of non-deterministic fields
//! (wall clocks, absolute paths) and quantized to integers; the canonical
//! encoder enforces the latter at this boundary. Re-running a deterministic
//! producer from the same seed through the same operations regenerates
//! byte-identical capsules and an identical chain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info};

use vault_ledger_core::{canonical_bytes, Cid, Codec, Sha256Digest, Value};
use vault_ledger_store::{AppendLog, ContentStore};

use crate::config::SeqEnforce;
use crate::error::{Result, VaultError};

pub const CAPSULE_SCHEMA: &str = "CheckpointCapsule.v1";

/// What a successful snapshot hands back to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Content identifier of the capsule record.
    pub capsule_cid: Cid,
    /// Hash of the chain entry that committed the capsule.
    pub chain_hash: Sha256Digest,
}

/// Builds and commits checkpoint capsules.
pub struct CheckpointEngine {
    content: Arc<dyn ContentStore>,
    log: Arc<dyn AppendLog>,
    enforce: SeqEnforce,
    /// Last accepted tick per stream; lazily seeded from the stream tip.
    ticks: Mutex<HashMap<String, Arc<Mutex<Option<u64>>>>>,
}

impl CheckpointEngine {
    pub fn new(
        content: Arc<dyn ContentStore>,
        log: Arc<dyn AppendLog>,
        enforce: SeqEnforce,
    ) -> Self {
        Self {
            content,
            log,
            enforce,
            ticks: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot producer state into a capsule on `stream_id`.
    ///
    /// On any failure the append is aborted whole; no half-linked capsule
    /// becomes visible. Orphaned state blobs are harmless: they are
    /// content-addressed and unreferenced.
    pub fn snapshot(
        &self,
        stream_id: &str,
        tick: u64,
        state: &Value,
        producer_metadata: &Value,
        deadline: Option<Instant>,
    ) -> Result<Snapshot> {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(VaultError::Timeout);
        }

        let state_bytes =
            canonical_bytes(state).map_err(VaultError::ProducerStateNonCanonical)?;
        let state_digest = Sha256Digest::hash(&state_bytes);
        let state_payload_cid = self.content.put(&state_bytes, Codec::Json)?;

        let cell = {
            let mut ticks = self.ticks.lock().unwrap();
            Arc::clone(ticks.entry(stream_id.to_string()).or_default())
        };
        let mut last_tick = cell.lock().unwrap();

        let tip = self.log.tip(stream_id)?;
        if last_tick.is_none() {
            *last_tick = self.tick_at_tip(stream_id, tip.as_ref())?;
        }
        if let Some(last) = *last_tick {
            let ordered = match self.enforce {
                SeqEnforce::Strict => tick > last,
                SeqEnforce::MonotonicNonstrict => tick >= last,
            };
            if !ordered {
                return Err(VaultError::CheckpointOutOfOrder {
                    stream: stream_id.to_string(),
                    tick,
                    last,
                });
            }
        }

        let parent_capsule_cid = tip.as_ref().map(|e| e.payload_cid);
        let capsule = capsule_record(
            stream_id,
            tick,
            &state_digest,
            &state_payload_cid,
            parent_capsule_cid.as_ref(),
            producer_metadata,
        );

        let capsule_bytes = canonical_bytes(&capsule)?;
        let capsule_cid = self.content.put(&capsule_bytes, Codec::Json)?;
        let entry = self.log.append(stream_id, &capsule, &capsule_cid)?;
        *last_tick = Some(tick);

        debug!(stream = stream_id, tick, seq = entry.seq, "capsule committed");
        Ok(Snapshot {
            capsule_cid,
            chain_hash: entry.hash,
        })
    }

    /// Read the tick recorded by the capsule at the stream tip.
    fn tick_at_tip(
        &self,
        stream_id: &str,
        tip: Option<&vault_ledger_core::ChainEntry>,
    ) -> Result<Option<u64>> {
        let Some(tip) = tip else {
            return Ok(None);
        };
        let record = self.log.get_record(stream_id, tip.seq)?;
        let tick = record
            .as_ref()
            .and_then(|r| r.get("tick"))
            .and_then(Value::as_int)
            .and_then(|t| u64::try_from(t).ok());
        if tick.is_none() {
            info!(stream = stream_id, seq = tip.seq, "tip record carries no tick");
        }
        Ok(tick)
    }
}

/// Assemble the capsule record. Wall clocks stay out: the only time-like
/// field is the producer's own tick.
fn capsule_record(
    stream_id: &str,
    tick: u64,
    state_digest: &Sha256Digest,
    state_payload_cid: &Cid,
    parent_capsule_cid: Option<&Cid>,
    producer_metadata: &Value,
) -> Value {
    Value::Map(vec![
        (Value::text("schema_version"), Value::text(CAPSULE_SCHEMA)),
        (Value::text("stream_id"), Value::text(stream_id)),
        (Value::text("tick"), Value::uint(tick)),
        (
            Value::text("state_digest"),
            Value::text(state_digest.to_hex()),
        ),
        (
            Value::text("state_payload_cid"),
            Value::text(state_payload_cid.to_string()),
        ),
        (
            Value::text("parent_capsule_cid"),
            match parent_capsule_cid {
                Some(cid) => Value::text(cid.to_string()),
                None => Value::Null,
            },
        ),
        (
            Value::text("producer_metadata"),
            producer_metadata.clone(),
        ),
    ])
}
