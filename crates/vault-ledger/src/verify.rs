//! Offline verification: replay chains, receipts, and capsule lineage.
//!
//! Verification never repairs anything. A single failing entry marks the
//! stream BROKEN and halts its writers, but the walk continues to the end
//! so operators see every defect at once.

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use vault_ledger_core::{
    canonical_bytes, chain, ChainEntry, Cid, Sha256Digest, SignatureBytes, Value, VaultPublicKey,
};
use vault_ledger_store::{AppendLog, ContentStore, StoreError};

use crate::anchor::{AnchorReceipt, ANCHOR_RECEIPT_SCHEMA};
use crate::checkpoint::CAPSULE_SCHEMA;
use crate::error::Result;

/// One defect found at one entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Defect {
    /// The frame was unreadable; nothing beyond its position is known.
    #[error("corrupt entry: {0}")]
    CorruptEntry(String),

    #[error("genesis entry carries a prev_hash")]
    GenesisWithPrev,

    #[error("expected seq {expected}, found {got}")]
    SeqDiscontinuity { expected: u64, got: u64 },

    #[error("prev_hash does not match predecessor hash")]
    PrevHashMismatch,

    #[error("stored hash does not match recomputed link")]
    HashMismatch,

    #[error("stored record does not hash to record_digest")]
    RecordDigestMismatch,

    #[error("payload {cid} not found in content store")]
    PayloadMissing { cid: String },

    #[error("payload {cid} bytes do not rehash to record_digest")]
    PayloadDigestMismatch { cid: String },

    #[error("capsule is malformed: {0}")]
    CapsuleInvalid(String),

    #[error("parent_capsule_cid does not match predecessor capsule")]
    ParentCidMismatch,

    #[error("capsule tick {got} went backwards (last was {last})")]
    TickRegression { last: u64, got: u64 },

    #[error("capsule state does not rehash to state_digest at tick {tick}")]
    StateDigestMismatch { tick: u64 },

    #[error("replayed state diverges from capsule at tick {tick}")]
    ReplayDivergence { tick: u64 },
}

/// Verdict for one entry of the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryVerdict {
    /// Sequence number, when the entry was readable at all.
    pub seq: Option<u64>,
    pub defects: Vec<Defect>,
}

impl EntryVerdict {
    pub fn is_ok(&self) -> bool {
        self.defects.is_empty()
    }
}

/// Full walk outcome for one stream.
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub stream: String,
    pub verdicts: Vec<EntryVerdict>,
}

impl StreamReport {
    /// No entry had any defect.
    pub fn is_intact(&self) -> bool {
        self.verdicts.iter().all(EntryVerdict::is_ok)
    }

    /// All defects, flattened with their sequence numbers.
    pub fn defects(&self) -> impl Iterator<Item = (Option<u64>, &Defect)> {
        self.verdicts
            .iter()
            .flat_map(|v| v.defects.iter().map(move |d| (v.seq, d)))
    }
}

/// Why a receipt failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptDefect {
    #[error("unsupported receipt schema_version: {0:?}")]
    SchemaInvalid(String),

    #[error("receipt is not sealed")]
    NotSealed,

    #[error("vault_fingerprint does not match the public key")]
    FingerprintMismatch,

    #[error("signature is not valid base64url")]
    MalformedSignature,

    #[error("signature does not verify over the pre-anchor bytes")]
    SignatureInvalid,

    #[error("anchor_hash does not match the sealed receipt")]
    AnchorHashMismatch,

    #[error("receipt could not be canonicalized: {0}")]
    NotCanonical(String),
}

/// Verify a sealed receipt against a vault public key.
///
/// Recomputes the pre-anchor canonicalization, checks the signature over
/// it, then recomputes `anchor_hash` and compares constant-time.
pub fn verify_receipt(
    receipt: &AnchorReceipt,
    public_key: &VaultPublicKey,
) -> std::result::Result<(), ReceiptDefect> {
    if receipt.schema_version != ANCHOR_RECEIPT_SCHEMA {
        return Err(ReceiptDefect::SchemaInvalid(receipt.schema_version.clone()));
    }
    if !receipt.sealed {
        return Err(ReceiptDefect::NotSealed);
    }

    let claimed_fingerprint = Sha256Digest::from_hex(&receipt.vault_fingerprint)
        .map_err(|_| ReceiptDefect::FingerprintMismatch)?;
    if !public_key.fingerprint().ct_eq(&claimed_fingerprint) {
        return Err(ReceiptDefect::FingerprintMismatch);
    }

    let signature = SignatureBytes::from_base64url(&receipt.signature)
        .map_err(|_| ReceiptDefect::MalformedSignature)?;
    let pre_anchor = receipt
        .sealing_bytes(false)
        .map_err(|e| ReceiptDefect::NotCanonical(e.to_string()))?;
    public_key
        .verify(&pre_anchor, &signature)
        .map_err(|_| ReceiptDefect::SignatureInvalid)?;

    let sealed = receipt
        .sealing_bytes(true)
        .map_err(|e| ReceiptDefect::NotCanonical(e.to_string()))?;
    let claimed_hash = Sha256Digest::from_hex(&receipt.anchor_hash)
        .map_err(|_| ReceiptDefect::AnchorHashMismatch)?;
    if !Sha256Digest::hash(&sealed).ct_eq(&claimed_hash) {
        return Err(ReceiptDefect::AnchorHashMismatch);
    }
    Ok(())
}

/// A producer that can deterministically regenerate its state at a tick.
pub trait ReplayProducer {
    /// Canonical state at `tick`, recomputed from the declared seed.
    fn state_at(&mut self, tick: u64) -> Result<Value>;
}

/// Walks streams and capsule chains, recomputing every hash.
pub struct ReplayVerifier {
    content: Arc<dyn ContentStore>,
    log: Arc<dyn AppendLog>,
}

impl ReplayVerifier {
    pub fn new(content: Arc<dyn ContentStore>, log: Arc<dyn AppendLog>) -> Self {
        Self { content, log }
    }

    /// Verify a stream from genesis.
    ///
    /// Any defect quarantines the stream (writers fail until operator
    /// reset), but the walk always runs to the end.
    pub fn verify_stream(&self, stream: &str) -> Result<StreamReport> {
        self.walk(stream, false, None)
    }

    /// Verify a capsule stream: everything `verify_stream` checks, plus
    /// capsule shape, parent CID lineage, tick ordering, and state digest
    /// resolution.
    pub fn verify_capsule_chain(&self, stream: &str) -> Result<StreamReport> {
        self.walk(stream, true, None)
    }

    /// Capsule verification plus deterministic re-execution: the producer
    /// regenerates state at every tick and each digest must match.
    pub fn verify_capsule_chain_with(
        &self,
        stream: &str,
        producer: &mut dyn ReplayProducer,
    ) -> Result<StreamReport> {
        self.walk(stream, true, Some(producer))
    }

    fn walk(
        &self,
        stream: &str,
        capsules: bool,
        mut producer: Option<&mut dyn ReplayProducer>,
    ) -> Result<StreamReport> {
        let mut verdicts = Vec::new();
        let mut prev: Option<ChainEntry> = None;
        let mut last_tick: Option<u64> = None;

        for item in self.log.scan_records(stream, 0)? {
            let (entry, record) = match item {
                Ok(pair) => pair,
                Err(StoreError::CorruptEntry { reason, offset, .. }) => {
                    verdicts.push(EntryVerdict {
                        seq: None,
                        defects: vec![Defect::CorruptEntry(format!(
                            "byte {offset}: {reason}"
                        ))],
                    });
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let mut defects = Vec::new();
            self.check_entry(&entry, &record, prev.as_ref(), &mut defects);
            if capsules {
                match producer {
                    Some(ref mut p) => self.check_capsule(
                        stream,
                        &record,
                        prev.as_ref(),
                        &mut last_tick,
                        Some(&mut **p),
                        &mut defects,
                    ),
                    None => self.check_capsule(
                        stream,
                        &record,
                        prev.as_ref(),
                        &mut last_tick,
                        None,
                        &mut defects,
                    ),
                }
            }

            verdicts.push(EntryVerdict {
                seq: Some(entry.seq),
                defects,
            });
            prev = Some(entry);
        }

        let report = StreamReport {
            stream: stream.to_string(),
            verdicts,
        };
        if !report.is_intact() {
            warn!(
                stream,
                defects = report.defects().count(),
                "stream failed verification, quarantining"
            );
            self.log.quarantine(stream)?;
        }
        Ok(report)
    }

    /// Chain-level checks for one entry.
    fn check_entry(
        &self,
        entry: &ChainEntry,
        record: &Value,
        prev: Option<&ChainEntry>,
        defects: &mut Vec<Defect>,
    ) {
        match prev {
            None => {
                if entry.seq != 0 {
                    defects.push(Defect::SeqDiscontinuity {
                        expected: 0,
                        got: entry.seq,
                    });
                }
                if entry.prev_hash.is_some() {
                    defects.push(Defect::GenesisWithPrev);
                }
            }
            Some(prev) => match chain::verify_pair(prev, entry) {
                Ok(()) => {}
                Err(chain::ChainDefect::SeqNotContiguous { prev_seq, next_seq }) => {
                    defects.push(Defect::SeqDiscontinuity {
                        expected: prev_seq + 1,
                        got: next_seq,
                    });
                }
                Err(_) => defects.push(Defect::PrevHashMismatch),
            },
        }

        match entry.recompute_hash() {
            Ok(recomputed) if recomputed.ct_eq(&entry.hash) => {}
            _ => defects.push(Defect::HashMismatch),
        }

        match canonical_bytes(record) {
            Ok(bytes) if Sha256Digest::hash(&bytes).ct_eq(&entry.record_digest) => {}
            _ => defects.push(Defect::RecordDigestMismatch),
        }

        match self.content.get(&entry.payload_cid) {
            Ok(Some(bytes)) => {
                if !Sha256Digest::hash(&bytes).ct_eq(&entry.record_digest) {
                    defects.push(Defect::PayloadDigestMismatch {
                        cid: entry.payload_cid.to_string(),
                    });
                }
            }
            _ => defects.push(Defect::PayloadMissing {
                cid: entry.payload_cid.to_string(),
            }),
        }
    }

    /// Capsule-level checks for one entry.
    fn check_capsule(
        &self,
        stream: &str,
        record: &Value,
        prev: Option<&ChainEntry>,
        last_tick: &mut Option<u64>,
        producer: Option<&mut dyn ReplayProducer>,
        defects: &mut Vec<Defect>,
    ) {
        if record.get("schema_version").and_then(Value::as_str) != Some(CAPSULE_SCHEMA) {
            defects.push(Defect::CapsuleInvalid("wrong schema_version".into()));
            return;
        }
        if record.get("stream_id").and_then(Value::as_str) != Some(stream) {
            defects.push(Defect::CapsuleInvalid("stream_id mismatch".into()));
        }

        let tick = record
            .get("tick")
            .and_then(Value::as_int)
            .and_then(|t| u64::try_from(t).ok());
        let Some(tick) = tick else {
            defects.push(Defect::CapsuleInvalid("missing tick".into()));
            return;
        };
        if let Some(last) = *last_tick {
            if tick < last {
                defects.push(Defect::TickRegression { last, got: tick });
            }
        }
        *last_tick = Some(tick);

        let parent = record.get("parent_capsule_cid");
        let expected_parent = prev.map(|p| p.payload_cid.to_string());
        let parent_ok = match (parent, &expected_parent) {
            (Some(Value::Null), None) => true,
            (Some(Value::Text(s)), Some(expected)) => s == expected,
            _ => false,
        };
        if !parent_ok {
            defects.push(Defect::ParentCidMismatch);
        }

        let state_digest = record
            .get("state_digest")
            .and_then(Value::as_str)
            .and_then(|s| Sha256Digest::from_hex(s).ok());
        let state_cid = record
            .get("state_payload_cid")
            .and_then(Value::as_str)
            .and_then(|s| Cid::from_str(s).ok());
        let (Some(state_digest), Some(state_cid)) = (state_digest, state_cid) else {
            defects.push(Defect::CapsuleInvalid(
                "missing state_digest or state_payload_cid".into(),
            ));
            return;
        };

        match self.content.get(&state_cid) {
            Ok(Some(bytes)) => {
                if !Sha256Digest::hash(&bytes).ct_eq(&state_digest) {
                    defects.push(Defect::StateDigestMismatch { tick });
                }
            }
            _ => defects.push(Defect::PayloadMissing {
                cid: state_cid.to_string(),
            }),
        }

        if let Some(producer) = producer {
            let replayed = producer
                .state_at(tick)
                .ok()
                .and_then(|state| canonical_bytes(&state).ok())
                .map(|bytes| Sha256Digest::hash(&bytes));
            match replayed {
                Some(digest) if digest.ct_eq(&state_digest) => {}
                _ => defects.push(Defect::ReplayDivergence { tick }),
            }
        }
    }
}
