//! Hash chain links for append-only streams.
//!
//! Every appended record becomes one [`ChainEntry`]. The entry hash covers
//! exactly four fields (`prev_hash`, `record_digest`, `payload_cid`, `seq`)
//! through the canonical encoder. Wall-clock fields are carried alongside
//! but never hashed, so replaying the same records always reproduces the
//! same chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical::canonical_bytes;
use crate::cid::Cid;
use crate::crypto::Sha256Digest;
use crate::error::CanonicalError;
use crate::value::Value;

/// One committed link of a stream's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// Hash of the predecessor entry; `None` at genesis (`seq == 0`).
    pub prev_hash: Option<Sha256Digest>,

    /// This entry's hash: `link(prev_hash, record_digest, payload_cid, seq)`.
    pub hash: Sha256Digest,

    /// Digest of the record's canonical bytes.
    pub record_digest: Sha256Digest,

    /// Content identifier of the stored payload.
    pub payload_cid: Cid,

    /// Position in the stream, starting at 0.
    pub seq: u64,

    /// Ingestion wall clock (Unix milliseconds). Not part of the hash.
    pub ts_ingested: i64,
}

impl ChainEntry {
    /// Recompute this entry's hash from its hashed fields.
    pub fn recompute_hash(&self) -> Result<Sha256Digest, CanonicalError> {
        link(
            self.prev_hash.as_ref(),
            &self.record_digest,
            &self.payload_cid,
            self.seq,
        )
    }
}

/// Compute the entry hash for one link.
///
/// The preimage is the canonical bytes of
/// `{"payload_cid", "prev_hash", "record_digest", "seq"}` with `null`
/// preserved for `prev_hash` at genesis.
pub fn link(
    prev_hash: Option<&Sha256Digest>,
    record_digest: &Sha256Digest,
    payload_cid: &Cid,
    seq: u64,
) -> Result<Sha256Digest, CanonicalError> {
    let entries = vec![
        (
            Value::text("prev_hash"),
            match prev_hash {
                Some(h) => Value::text(h.to_hex()),
                None => Value::Null,
            },
        ),
        (
            Value::text("record_digest"),
            Value::text(record_digest.to_hex()),
        ),
        (
            Value::text("payload_cid"),
            Value::text(payload_cid.to_string()),
        ),
        (Value::text("seq"), Value::uint(seq)),
    ];

    let bytes = canonical_bytes(&Value::Map(entries))?;
    Ok(Sha256Digest::hash(&bytes))
}

/// Why two adjacent entries do not chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainDefect {
    #[error("entry {seq}: prev_hash does not match predecessor hash")]
    PrevHashMismatch { seq: u64 },

    #[error("entry {next_seq} does not follow {prev_seq}")]
    SeqNotContiguous { prev_seq: u64, next_seq: u64 },

    #[error("genesis entry carries a prev_hash")]
    GenesisWithPrev,

    #[error("entry {seq}: stored hash does not match recomputed link")]
    HashMismatch { seq: u64 },
}

/// Check that `next` is the legitimate successor of `prev`.
///
/// Verifies `seq` contiguity and `prev_hash` linkage. The entries' own
/// hashes are assumed verified separately (see [`ChainEntry::recompute_hash`]).
pub fn verify_pair(prev: &ChainEntry, next: &ChainEntry) -> Result<(), ChainDefect> {
    if next.seq != prev.seq + 1 {
        return Err(ChainDefect::SeqNotContiguous {
            prev_seq: prev.seq,
            next_seq: next.seq,
        });
    }
    match &next.prev_hash {
        Some(h) if h.ct_eq(&prev.hash) => Ok(()),
        _ => Err(ChainDefect::PrevHashMismatch { seq: next.seq }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::Codec;

    fn entry(seq: u64, prev: Option<Sha256Digest>) -> ChainEntry {
        let record_digest = Sha256Digest::hash(format!("record-{seq}").as_bytes());
        let payload_cid = Cid::new(Codec::Raw, record_digest);
        let hash = link(prev.as_ref(), &record_digest, &payload_cid, seq).unwrap();
        ChainEntry {
            prev_hash: prev,
            hash,
            record_digest,
            payload_cid,
            seq,
            ts_ingested: 1_736_870_400_000,
        }
    }

    #[test]
    fn test_link_deterministic() {
        let digest = Sha256Digest::hash(b"r");
        let cid = Cid::of(Codec::Raw, b"r");
        let h1 = link(None, &digest, &cid, 0).unwrap();
        let h2 = link(None, &digest, &cid, 0).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_link_depends_on_every_field() {
        let digest = Sha256Digest::hash(b"r");
        let cid = Cid::of(Codec::Raw, b"r");
        let base = link(None, &digest, &cid, 0).unwrap();

        let other_digest = Sha256Digest::hash(b"s");
        assert_ne!(link(None, &other_digest, &cid, 0).unwrap(), base);
        assert_ne!(link(None, &digest, &cid, 1).unwrap(), base);
        assert_ne!(link(Some(&base), &digest, &cid, 0).unwrap(), base);
        let other_cid = Cid::of(Codec::Json, b"r");
        assert_ne!(link(None, &digest, &other_cid, 0).unwrap(), base);
    }

    #[test]
    fn test_ts_not_hashed() {
        let e = entry(0, None);
        let mut later = e.clone();
        later.ts_ingested += 86_400_000;
        assert_eq!(
            later.recompute_hash().unwrap(),
            e.recompute_hash().unwrap()
        );
    }

    #[test]
    fn test_verify_pair_ok() {
        let genesis = entry(0, None);
        let second = entry(1, Some(genesis.hash));
        verify_pair(&genesis, &second).unwrap();
    }

    #[test]
    fn test_verify_pair_rejects_gap() {
        let genesis = entry(0, None);
        let skipped = entry(2, Some(genesis.hash));
        assert_eq!(
            verify_pair(&genesis, &skipped),
            Err(ChainDefect::SeqNotContiguous {
                prev_seq: 0,
                next_seq: 2
            })
        );
    }

    #[test]
    fn test_verify_pair_rejects_wrong_prev() {
        let genesis = entry(0, None);
        let wrong = entry(1, Some(Sha256Digest::hash(b"unrelated")));
        assert_eq!(
            verify_pair(&genesis, &wrong),
            Err(ChainDefect::PrevHashMismatch { seq: 1 })
        );
    }

    #[test]
    fn test_verify_pair_rejects_missing_prev() {
        let genesis = entry(0, None);
        let next = entry(1, None);
        assert_eq!(
            verify_pair(&genesis, &next),
            Err(ChainDefect::PrevHashMismatch { seq: 1 })
        );
    }

    #[test]
    fn test_entry_serde_roundtrip() {
        let e = entry(1, Some(Sha256Digest::hash(b"prev")));
        let json = serde_json::to_string(&e).unwrap();
        let back: ChainEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);

        let genesis = entry(0, None);
        let json = serde_json::to_string(&genesis).unwrap();
        assert!(json.contains("\"prev_hash\":null"));
        let back: ChainEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, genesis);
    }
}
