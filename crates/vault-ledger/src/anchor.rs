//! The write-anchor protocol: validate, deduplicate, sign, persist.
//!
//! An anchor is a signed, deduplicated receipt attesting that a payload
//! (identified by its digest) was witnessed at a given time by a key. The
//! caller hashes its own payload; the vault stores metadata only.
//!
//! Sealing order is load-bearing:
//!
//! 1. the signature covers the canonical receipt with `anchor_hash: ""`
//!    and no `signature` member;
//! 2. `anchor_hash` covers the canonical receipt with `anchor_hash: ""`
//!    and the `signature` member present.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use vault_ledger_core::{
    canonical_bytes, CanonicalError, Codec, Sha256Digest, Value, VaultKeypair, VaultPublicKey,
};
use vault_ledger_store::{AppendLog, ContentStore, KeyArchive};

use crate::error::{Result, VaultError};

pub const ANCHOR_REQUEST_SCHEMA: &str = "VaultAnchorWriteRequest.v1";
pub const ANCHOR_RECEIPT_SCHEMA: &str = "VaultFossilizationReceipt.v1";
pub const LEDGER_LINE_SCHEMA: &str = "VaultLedgerLine.v1";

/// `VaultAnchorWriteRequest.v1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub schema_version: String,
    pub artifact_kind: String,
    pub payload_hash_sha256: String,
    pub run_id: String,
    pub operator: String,
    pub ts: String,
}

impl AnchorRequest {
    /// Parse a request from loose JSON, reporting the first absent field.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let field = |name: &'static str| -> Result<String> {
            match json.get(name) {
                Some(serde_json::Value::String(s)) => Ok(s.clone()),
                _ => Err(VaultError::MissingRequiredField(name)),
            }
        };
        Ok(Self {
            schema_version: field("schema_version")?,
            artifact_kind: field("artifact_kind")?,
            payload_hash_sha256: field("payload_hash_sha256")?,
            run_id: field("run_id")?,
            operator: field("operator")?,
            ts: field("ts")?,
        })
    }
}

/// `VaultFossilizationReceipt.v1`: the sealed attestation a caller retains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub schema_version: String,
    pub artifact_kind: String,
    pub payload_hash: String,
    pub vault_fingerprint: String,
    pub anchor_id: String,
    pub anchor_hash: String,
    pub ts: String,
    pub sealed: bool,
    pub signature: String,
}

impl AnchorReceipt {
    /// Canonical bytes of the receipt with `anchor_hash` forced to the
    /// empty string. `with_signature` controls whether the `signature`
    /// member participates.
    pub fn sealing_bytes(&self, with_signature: bool) -> std::result::Result<Vec<u8>, CanonicalError> {
        let mut entries = vec![
            (
                Value::text("schema_version"),
                Value::text(&*self.schema_version),
            ),
            (
                Value::text("artifact_kind"),
                Value::text(&*self.artifact_kind),
            ),
            (Value::text("payload_hash"), Value::text(&*self.payload_hash)),
            (
                Value::text("vault_fingerprint"),
                Value::text(&*self.vault_fingerprint),
            ),
            (Value::text("anchor_id"), Value::text(&*self.anchor_id)),
            (Value::text("anchor_hash"), Value::text("")),
            (Value::text("ts"), Value::text(&*self.ts)),
            (Value::text("sealed"), Value::Bool(self.sealed)),
        ];
        if with_signature {
            entries.push((Value::text("signature"), Value::text(&*self.signature)));
        }
        canonical_bytes(&Value::Map(entries))
    }
}

struct AnchorState {
    keypair: Option<VaultKeypair>,
    fingerprint: String,
    stream: String,
    anchored: HashSet<String>,
}

/// The anchor service. One instance exclusively owns the vault key.
///
/// All anchor operations serialize on the internal state lock so the
/// duplicate check and the append are a single atomic step.
pub struct AnchorService {
    content: Arc<dyn ContentStore>,
    log: Arc<dyn AppendLog>,
    archive: Option<Arc<KeyArchive>>,
    state: Mutex<AnchorState>,
}

impl AnchorService {
    /// Create a service with no key loaded. Writes fail `KeyUnavailable`
    /// until [`init`](Self::init) runs.
    pub fn new(
        content: Arc<dyn ContentStore>,
        log: Arc<dyn AppendLog>,
        archive: Option<Arc<KeyArchive>>,
    ) -> Self {
        Self {
            content,
            log,
            archive,
            state: Mutex::new(AnchorState {
                keypair: None,
                fingerprint: String::new(),
                stream: String::new(),
                anchored: HashSet::new(),
            }),
        }
    }

    /// Load a signing key: compute the fingerprint, archive the public
    /// half, open (or resume) the fingerprint-bound anchor stream, and
    /// rebuild the duplicate index from it.
    pub fn init(&self, keypair: VaultKeypair) -> Result<()> {
        let fingerprint = keypair.fingerprint().to_hex();
        let stream = format!("anchor-{}", &fingerprint[..16]);

        if let Some(archive) = &self.archive {
            archive.record(&keypair.public_key())?;
        }

        let mut anchored = HashSet::new();
        for item in self.log.scan_records(&stream, 0)? {
            let (_, record) = item?;
            if let Some(hash) = record.get("payload_hash").and_then(Value::as_str) {
                anchored.insert(hash.to_string());
            }
        }

        let mut state = self.state.lock().unwrap();
        info!(fingerprint = %fingerprint, stream = %stream, resumed = anchored.len(), "anchor key loaded");
        *state = AnchorState {
            keypair: Some(keypair),
            fingerprint,
            stream,
            anchored,
        };
        Ok(())
    }

    /// Drop the signing key. The dalek key zeroizes on drop; subsequent
    /// writes fail `KeyUnavailable`.
    pub fn teardown(&self) {
        let mut state = self.state.lock().unwrap();
        state.keypair = None;
        warn!(fingerprint = %state.fingerprint, "anchor key torn down");
    }

    /// Rotation: teardown plus init with a new key. A new anchor stream
    /// opens; old streams stay verifiable through the key archive.
    pub fn rotate(&self, keypair: VaultKeypair) -> Result<()> {
        self.teardown();
        self.init(keypair)
    }

    /// The active public key, if a key is loaded.
    pub fn public_key(&self) -> Option<VaultPublicKey> {
        self.state
            .lock()
            .unwrap()
            .keypair
            .as_ref()
            .map(VaultKeypair::public_key)
    }

    /// The active anchor stream name, if a key is loaded.
    pub fn stream(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        if state.keypair.is_some() {
            Some(state.stream.clone())
        } else {
            None
        }
    }

    /// Execute `VaultAnchorWrite.v1`.
    pub fn write_anchor(
        &self,
        request: &AnchorRequest,
        deadline: Option<Instant>,
    ) -> Result<AnchorReceipt> {
        validate_request(request)?;

        // Cancellation is only honored before the lock; after it, the
        // operation runs to commit or rollback.
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(VaultError::Timeout);
        }

        let mut state = self.state.lock().unwrap();
        let keypair = state.keypair.as_ref().ok_or(VaultError::KeyUnavailable)?;

        if state.anchored.contains(&request.payload_hash_sha256) {
            return Err(VaultError::DuplicateAnchor(
                request.payload_hash_sha256.clone(),
            ));
        }

        let mut receipt = AnchorReceipt {
            schema_version: ANCHOR_RECEIPT_SCHEMA.to_string(),
            artifact_kind: request.artifact_kind.clone(),
            payload_hash: request.payload_hash_sha256.clone(),
            vault_fingerprint: state.fingerprint.clone(),
            anchor_id: Uuid::new_v4().to_string(),
            anchor_hash: String::new(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            sealed: true,
            signature: String::new(),
        };

        let pre_anchor = receipt.sealing_bytes(false)?;
        receipt.signature = keypair.sign(&pre_anchor).to_base64url();

        let sealed = receipt.sealing_bytes(true)?;
        receipt.anchor_hash = Sha256Digest::hash(&sealed).to_hex();

        let line = ledger_line(&receipt, request);
        let line_bytes = canonical_bytes(&line)?;
        let payload_cid = self.content.put(&line_bytes, Codec::Json)?;
        let entry = self.log.append(&state.stream, &line, &payload_cid)?;

        state
            .anchored
            .insert(request.payload_hash_sha256.clone());

        info!(
            anchor_id = %receipt.anchor_id,
            seq = entry.seq,
            artifact_kind = %receipt.artifact_kind,
            "anchor sealed"
        );
        Ok(receipt)
    }
}

/// Project a sealed receipt to its `VaultLedgerLine.v1` record.
fn ledger_line(receipt: &AnchorReceipt, request: &AnchorRequest) -> Value {
    Value::Map(vec![
        (Value::text("schema_version"), Value::text(LEDGER_LINE_SCHEMA)),
        (
            Value::text("artifact_kind"),
            Value::text(&*receipt.artifact_kind),
        ),
        (
            Value::text("payload_hash"),
            Value::text(&*receipt.payload_hash),
        ),
        (
            Value::text("vault_fingerprint"),
            Value::text(&*receipt.vault_fingerprint),
        ),
        (Value::text("anchor_id"), Value::text(&*receipt.anchor_id)),
        (Value::text("anchor_hash"), Value::text(&*receipt.anchor_hash)),
        (Value::text("ts"), Value::text(&*receipt.ts)),
        (Value::text("sealed"), Value::Bool(receipt.sealed)),
        (Value::text("signature"), Value::text(&*receipt.signature)),
        (Value::text("run_id"), Value::text(&*request.run_id)),
        (Value::text("operator"), Value::text(&*request.operator)),
    ])
}

fn validate_request(request: &AnchorRequest) -> Result<()> {
    if request.schema_version != ANCHOR_REQUEST_SCHEMA {
        return Err(VaultError::InvalidSchemaVersion(
            request.schema_version.clone(),
        ));
    }
    for (name, value) in [
        ("artifact_kind", &request.artifact_kind),
        ("payload_hash_sha256", &request.payload_hash_sha256),
        ("run_id", &request.run_id),
        ("operator", &request.operator),
        ("ts", &request.ts),
    ] {
        if value.is_empty() {
            return Err(VaultError::MissingRequiredField(name));
        }
    }
    if Sha256Digest::from_hex(&request.payload_hash_sha256).is_err() {
        return Err(VaultError::InvalidPayloadHash);
    }
    let parses = chrono::DateTime::parse_from_rfc3339(&request.ts).is_ok();
    if !request.ts.ends_with('Z') || !parses {
        return Err(VaultError::InvalidTimestamp(request.ts.clone()));
    }
    Ok(())
}
