//! Public-key archive: `vault_fingerprint -> public key bytes`.
//!
//! Receipts stay verifiable long after the key that signed them rotated
//! out. Every fingerprint ever used gets one `<fingerprint>.pub` file; old
//! entries are never rewritten.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use vault_ledger_core::{Sha256Digest, VaultPublicKey};

use crate::error::{Result, StoreError};

/// Directory-backed fingerprint archive.
pub struct KeyArchive {
    dir: PathBuf,
}

impl KeyArchive {
    /// Open (or create) the archive directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, fingerprint: &Sha256Digest) -> PathBuf {
        self.dir.join(format!("{}.pub", fingerprint.to_hex()))
    }

    /// Record a public key under its fingerprint. Idempotent.
    pub fn record(&self, key: &VaultPublicKey) -> Result<Sha256Digest> {
        let fingerprint = key.fingerprint();
        let path = self.entry_path(&fingerprint);
        if !path.exists() {
            let tmp = path.with_extension("pub.tmp");
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(key.to_hex().as_bytes())?;
            file.sync_all()?;
            drop(file);
            fs::rename(&tmp, &path)?;
        }
        Ok(fingerprint)
    }

    /// Look up the public key behind a fingerprint.
    pub fn lookup(&self, fingerprint: &Sha256Digest) -> Result<Option<VaultPublicKey>> {
        let path = self.entry_path(fingerprint);
        let content = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let key = VaultPublicKey::from_hex(content.trim())
            .map_err(|e| StoreError::Encoding(format!("archived key unreadable: {e}")))?;
        if !key.fingerprint().ct_eq(fingerprint) {
            return Err(StoreError::Encoding(
                "archived key does not match its fingerprint".into(),
            ));
        }
        Ok(Some(key))
    }

    /// All archived fingerprints.
    pub fn list(&self) -> Result<Vec<Sha256Digest>> {
        let mut out = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let name = dirent?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(hex) = name.strip_suffix(".pub") {
                if let Ok(fp) = Sha256Digest::from_hex(hex) {
                    out.push(fp);
                }
            }
        }
        Ok(out)
    }
}
