//! Test fixtures: a disposable vault over a temp directory.

use std::path::Path;

use tempfile::TempDir;
use vault_ledger::{AnchorRequest, Vault, VaultConfig, ANCHOR_REQUEST_SCHEMA};
use vault_ledger_core::{Sha256Digest, Value, VaultKeypair};

/// A vault with file-backed stores under a temp directory and a
/// deterministic seed key. The directory is removed on drop.
pub struct TestVault {
    pub vault: Vault,
    pub keypair: VaultKeypair,
    dir: TempDir,
}

impl TestVault {
    /// A vault keyed from seed `[0x42; 32]`.
    pub fn new() -> Self {
        Self::with_seed([0x42; 32])
    }

    /// A vault keyed from the given seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let keypair = VaultKeypair::from_seed(&seed);

        let seed_path = dir.path().join("seed.hex");
        std::fs::write(&seed_path, hex_encode(&seed)).expect("write seed");

        let config = VaultConfig {
            data_dir: dir.path().join("data"),
            anchor: vault_ledger::AnchorConfig {
                key_source: vault_ledger::KeySource::File { path: seed_path },
                stream_durable: true,
            },
            ..VaultConfig::default()
        };
        let vault = Vault::open(config).expect("open vault");
        Self { vault, keypair, dir }
    }

    /// Root of the vault's data directory.
    pub fn data_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("data")
    }

    /// Path of a stream's log file.
    pub fn stream_path(&self, stream: &str) -> std::path::PathBuf {
        self.data_dir().join("streams").join(format!("{stream}.log"))
    }

    /// Path of a blob in the content directory.
    pub fn blob_path(&self, hex_digest: &str) -> std::path::PathBuf {
        self.data_dir().join("blobs").join(hex_digest)
    }

    /// A well-formed anchor request for an arbitrary payload.
    pub fn anchor_request(&self, payload: &[u8]) -> AnchorRequest {
        AnchorRequest {
            schema_version: ANCHOR_REQUEST_SCHEMA.to_string(),
            artifact_kind: "InferenceReceipt.v1".to_string(),
            payload_hash_sha256: Sha256Digest::hash(payload).to_hex(),
            run_id: "run-test".to_string(),
            operator: "op-test".to_string(),
            ts: "2026-01-20T20:40:00Z".to_string(),
        }
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic producer state for checkpoint tests: pure function of
/// (seed, tick), integers only.
pub fn producer_state(seed: u64, tick: u64) -> Value {
    let mix = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(tick.wrapping_mul(1442695040888963407));
    Value::Map(vec![
        (Value::text("position_mm"), Value::uint(mix % 1_000_000)),
        (Value::text("velocity_mm_s"), Value::uint(mix % 90_000)),
        (Value::text("tick"), Value::uint(tick)),
    ])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Visible for callers that need the raw temp path.
impl AsRef<Path> for TestVault {
    fn as_ref(&self) -> &Path {
        self.dir.path()
    }
}
