//! Configuration for a vault instance.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Root directory for streams, blobs, and the key archive.
    pub data_dir: PathBuf,
    pub anchor: AnchorConfig,
    pub content: ContentConfig,
    pub checkpoint: CheckpointConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("vault-data"),
            anchor: AnchorConfig::default(),
            content: ContentConfig::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

/// Anchor service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Where the Ed25519 seed comes from.
    pub key_source: KeySource,
    /// Fsync every append to the anchor stream before acknowledging.
    pub stream_durable: bool,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            key_source: KeySource::Env {
                var: "VAULT_ANCHOR_SEED".into(),
            },
            stream_durable: true,
        }
    }
}

/// Source of the vault signing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeySource {
    /// A file holding the 64-character hex seed.
    File { path: PathBuf },
    /// An environment variable holding the hex seed.
    Env { var: String },
    /// A hardware module. Recognized but unprovisioned in this build;
    /// loading reports `KeyUnavailable`.
    Hsm,
}

/// Content store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContentConfig {
    /// External CAS endpoint to mirror payloads to; `None` disables
    /// mirroring. The transport client is supplied by the adapter.
    pub mirror: Option<String>,
}

/// Checkpoint engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CheckpointConfig {
    pub seq_enforce: SeqEnforce,
}

/// How producer ticks are ordered within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SeqEnforce {
    /// Ticks must strictly increase.
    #[default]
    #[serde(rename = "strict")]
    Strict,
    /// Ticks may repeat but never go backwards.
    #[serde(rename = "monotonic-nonstrict")]
    MonotonicNonstrict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert!(config.anchor.stream_durable);
        assert_eq!(config.checkpoint.seq_enforce, SeqEnforce::Strict);
        assert!(config.content.mirror.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: VaultConfig = serde_json::from_str(
            r#"{
                "data_dir": "/var/lib/vault",
                "anchor": {"key_source": {"kind": "file", "path": "/etc/vault/seed"}},
                "checkpoint": {"seq_enforce": "monotonic-nonstrict"}
            }"#,
        )
        .unwrap();
        assert!(matches!(config.anchor.key_source, KeySource::File { .. }));
        assert!(config.anchor.stream_durable);
        assert_eq!(config.checkpoint.seq_enforce, SeqEnforce::MonotonicNonstrict);
    }

    #[test]
    fn test_key_source_forms() {
        let s: KeySource = serde_json::from_str(r#"{"kind": "env", "var": "SEED"}"#).unwrap();
        assert!(matches!(s, KeySource::Env { .. }));
        let s: KeySource = serde_json::from_str(r#"{"kind": "hsm"}"#).unwrap();
        assert!(matches!(s, KeySource::Hsm));
    }
}
