//! The vault facade: one object wiring config, stores, and services.
//!
//! Adapters (HTTP server, CLI, MCP tool, SDK) call these operations and
//! translate errors with [`VaultError::http_status`]. The facade itself is
//! transport-free.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use bytes::Bytes;
use tracing::error;
use zeroize::Zeroizing;

use vault_ledger_core::{
    canonical_bytes, ChainEntry, Cid, Codec, Sha256Digest, Value, VaultKeypair, VaultPublicKey,
};
use vault_ledger_store::{
    AppendLog, ContentStore, DirContentStore, FileAppendLog, KeyArchive, MirrorTarget, StoreError,
};

use crate::anchor::{AnchorReceipt, AnchorRequest, AnchorService};
use crate::checkpoint::{CheckpointEngine, Snapshot};
use crate::config::{KeySource, VaultConfig};
use crate::error::{Result, VaultError};
use crate::verify::{ReceiptDefect, ReplayProducer, ReplayVerifier, StreamReport};

/// A running vault instance.
pub struct Vault {
    content: Arc<dyn ContentStore>,
    log: Arc<dyn AppendLog>,
    mirror: RwLock<Option<Box<dyn MirrorTarget>>>,
    archive: Option<Arc<KeyArchive>>,
    anchors: AnchorService,
    checkpoints: CheckpointEngine,
    verifier: ReplayVerifier,
}

impl Vault {
    /// Open a vault on disk: streams, blobs, and key archive under
    /// `config.data_dir`, signing key loaded per `config.anchor.key_source`.
    pub fn open(config: VaultConfig) -> Result<Self> {
        let content: Arc<dyn ContentStore> =
            Arc::new(DirContentStore::open(config.data_dir.join("blobs"))?);
        let log: Arc<dyn AppendLog> = Arc::new(FileAppendLog::open(
            config.data_dir.join("streams"),
            config.anchor.stream_durable,
        )?);
        let archive = Arc::new(KeyArchive::open(config.data_dir.join("keys"))?);
        let keypair = load_keypair(&config.anchor.key_source)?;
        Self::assemble(config, content, log, Some(archive), keypair)
    }

    /// Build a vault over caller-supplied stores. Used by tests and by
    /// adapters that bring their own backends.
    pub fn with_stores(
        config: VaultConfig,
        content: Arc<dyn ContentStore>,
        log: Arc<dyn AppendLog>,
        keypair: VaultKeypair,
    ) -> Result<Self> {
        Self::assemble(config, content, log, None, keypair)
    }

    fn assemble(
        config: VaultConfig,
        content: Arc<dyn ContentStore>,
        log: Arc<dyn AppendLog>,
        archive: Option<Arc<KeyArchive>>,
        keypair: VaultKeypair,
    ) -> Result<Self> {
        let anchors = AnchorService::new(
            Arc::clone(&content),
            Arc::clone(&log),
            archive.as_ref().map(Arc::clone),
        );
        anchors.init(keypair)?;

        let checkpoints = CheckpointEngine::new(
            Arc::clone(&content),
            Arc::clone(&log),
            config.checkpoint.seq_enforce,
        );
        let verifier = ReplayVerifier::new(Arc::clone(&content), Arc::clone(&log));

        Ok(Self {
            content,
            log,
            mirror: RwLock::new(None),
            archive,
            anchors,
            checkpoints,
            verifier,
        })
    }

    /// Install the mirror client built by the adapter for
    /// `content.mirror`. Subsequent puts forward bytes and enforce CID
    /// equality.
    pub fn set_mirror(&self, mirror: Box<dyn MirrorTarget>) {
        *self.mirror.write().unwrap() = Some(mirror);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Canonicalization and digests
    // ─────────────────────────────────────────────────────────────────────

    /// Canonical bytes of a record.
    pub fn canonicalize(&self, record: &Value) -> Result<Vec<u8>> {
        Ok(canonical_bytes(record)?)
    }

    /// Lowercase hex SHA-256 of arbitrary bytes.
    pub fn digest_hex(&self, bytes: &[u8]) -> String {
        Sha256Digest::hash(bytes).to_hex()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Content store
    // ─────────────────────────────────────────────────────────────────────

    /// Store payload bytes; mirror them if a mirror is installed.
    ///
    /// The mirror must report the same CID the local store computed;
    /// disagreement fails `CidMismatch` (the local blob stays).
    pub fn content_put(&self, bytes: &[u8], codec: Codec) -> Result<Cid> {
        let cid = self.content.put(bytes, codec)?;
        if let Some(mirror) = self.mirror.read().unwrap().as_ref() {
            let remote = mirror.store(&cid, bytes)?;
            if remote != cid {
                return Err(StoreError::CidMismatch {
                    local: cid.to_string(),
                    remote: remote.to_string(),
                }
                .into());
            }
        }
        Ok(cid)
    }

    /// Push an already-stored payload to the installed mirror.
    ///
    /// Fails `CidMismatch` when the mirror computes a different identifier,
    /// `StorageError` when the payload is absent locally or no mirror is
    /// installed.
    pub fn mirror_to(&self, cid: &Cid) -> Result<Cid> {
        let bytes = self
            .content
            .get(cid)?
            .ok_or_else(|| VaultError::StorageError(format!("payload {cid} not stored")))?;
        let guard = self.mirror.read().unwrap();
        let mirror = guard
            .as_ref()
            .ok_or_else(|| VaultError::StorageError("no mirror installed".into()))?;
        let remote = mirror.store(cid, &bytes)?;
        if remote != *cid {
            return Err(VaultError::CidMismatch {
                local: cid.to_string(),
                remote: remote.to_string(),
            });
        }
        Ok(remote)
    }

    /// Fetch payload bytes by CID.
    pub fn content_get(&self, cid: &Cid) -> Result<Option<Bytes>> {
        Ok(self.content.get(cid)?)
    }

    /// Whether a payload is present locally.
    pub fn content_has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.content.has(cid)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Streams
    // ─────────────────────────────────────────────────────────────────────

    /// Append a record to a named stream.
    pub fn stream_append(
        &self,
        stream: &str,
        record: &Value,
        payload_cid: &Cid,
    ) -> Result<ChainEntry> {
        Ok(self.log.append(stream, record, payload_cid)?)
    }

    /// The stream tip, or `None` for an empty stream.
    pub fn stream_tip(&self, stream: &str) -> Result<Option<ChainEntry>> {
        Ok(self.log.tip(stream)?)
    }

    /// Lazily iterate entries from `from_seq`.
    pub fn stream_scan(
        &self,
        stream: &str,
        from_seq: u64,
    ) -> Result<impl Iterator<Item = Result<ChainEntry>>> {
        let iter = self.log.scan(stream, from_seq)?;
        Ok(iter.map(|item| item.map_err(VaultError::from)))
    }

    /// Fetch the record appended at `seq`.
    pub fn stream_record(&self, stream: &str, seq: u64) -> Result<Option<Value>> {
        Ok(self.log.get_record(stream, seq)?)
    }

    /// Operator acknowledgement after an integrity failure.
    pub fn reset_stream(&self, stream: &str) -> Result<()> {
        Ok(self.log.reset(stream)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Checkpoints
    // ─────────────────────────────────────────────────────────────────────

    /// Snapshot producer state into a capsule on `stream_id`.
    pub fn checkpoint(
        &self,
        stream_id: &str,
        tick: u64,
        state: &Value,
        producer_metadata: &Value,
    ) -> Result<Snapshot> {
        self.checkpoints
            .snapshot(stream_id, tick, state, producer_metadata, None)
    }

    /// [`checkpoint`](Self::checkpoint) with a deadline honored before the
    /// stream lock is taken.
    pub fn checkpoint_with_deadline(
        &self,
        stream_id: &str,
        tick: u64,
        state: &Value,
        producer_metadata: &Value,
        deadline: Instant,
    ) -> Result<Snapshot> {
        self.checkpoints
            .snapshot(stream_id, tick, state, producer_metadata, Some(deadline))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Anchors
    // ─────────────────────────────────────────────────────────────────────

    /// Execute `VaultAnchorWrite.v1` and return the sealed receipt.
    pub fn anchor_write(&self, request: &AnchorRequest) -> Result<AnchorReceipt> {
        self.anchors.write_anchor(request, None)
    }

    /// [`anchor_write`](Self::anchor_write) with a deadline honored before
    /// the anchor lock is taken.
    pub fn anchor_write_with_deadline(
        &self,
        request: &AnchorRequest,
        deadline: Instant,
    ) -> Result<AnchorReceipt> {
        self.anchors.write_anchor(request, Some(deadline))
    }

    /// The active vault public key.
    pub fn public_key(&self) -> Result<VaultPublicKey> {
        self.anchors.public_key().ok_or(VaultError::KeyUnavailable)
    }

    /// The active anchor stream name.
    pub fn anchor_stream(&self) -> Result<String> {
        self.anchors.stream().ok_or(VaultError::KeyUnavailable)
    }

    /// Rotate the signing key: a new anchor stream opens, the new public
    /// key joins the archive, old receipts stay verifiable.
    pub fn rotate_key(&self, keypair: VaultKeypair) -> Result<()> {
        self.anchors.rotate(keypair)
    }

    /// Zeroize the signing key. Anchor writes fail `KeyUnavailable` until
    /// the next rotation.
    pub fn teardown_key(&self) {
        self.anchors.teardown();
    }

    /// Look up an archived public key by fingerprint, for verifying
    /// receipts sealed under rotated-out keys.
    pub fn archived_key(&self, fingerprint: &Sha256Digest) -> Result<Option<VaultPublicKey>> {
        match &self.archive {
            Some(archive) => Ok(archive.lookup(fingerprint)?),
            None => Ok(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────

    /// Recompute and check every link of a stream.
    pub fn verify_stream(&self, stream: &str) -> Result<StreamReport> {
        self.verifier.verify_stream(stream)
    }

    /// Verify a sealed receipt against a public key.
    pub fn verify_receipt(
        &self,
        receipt: &AnchorReceipt,
        public_key: &VaultPublicKey,
    ) -> std::result::Result<(), ReceiptDefect> {
        crate::verify::verify_receipt(receipt, public_key)
    }

    /// Verify a capsule stream's chain and lineage.
    pub fn verify_capsule_chain(&self, stream: &str) -> Result<StreamReport> {
        self.verifier.verify_capsule_chain(stream)
    }

    /// Capsule verification plus deterministic re-execution.
    pub fn verify_capsule_chain_with(
        &self,
        stream: &str,
        producer: &mut dyn ReplayProducer,
    ) -> Result<StreamReport> {
        self.verifier.verify_capsule_chain_with(stream, producer)
    }
}

/// Load the signing seed per the configured source.
fn load_keypair(source: &KeySource) -> Result<VaultKeypair> {
    match source {
        KeySource::File { path } => {
            let seed = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
                error!(path = %path.display(), error = %e, "seed file unreadable");
                VaultError::KeyUnavailable
            })?);
            Ok(VaultKeypair::from_seed_hex(&seed).map_err(|_| VaultError::KeyUnavailable)?)
        }
        KeySource::Env { var } => {
            let seed = Zeroizing::new(std::env::var(var).map_err(|_| {
                error!(var = %var, "seed environment variable unset");
                VaultError::KeyUnavailable
            })?);
            Ok(VaultKeypair::from_seed_hex(&seed).map_err(|_| VaultError::KeyUnavailable)?)
        }
        KeySource::Hsm => {
            error!("hsm key source is recognized but unprovisioned in this build");
            Err(VaultError::KeyUnavailable)
        }
    }
}
