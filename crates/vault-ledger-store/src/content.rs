//! Directory-backed content store: one blob per digest.
//!
//! Blobs are published atomically (write to a dot-prefixed temp file, fsync,
//! rename) so a reader never observes a half-written payload. Filenames are
//! the lowercase hex digest; the codec tag lives only in the CID, since two
//! codecs over identical bytes share identical content.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use bytes::Bytes;
use tracing::debug;
use vault_ledger_core::{Cid, Codec};

use crate::error::Result;
use crate::traits::ContentStore;

/// File-per-digest [`ContentStore`].
pub struct DirContentStore {
    dir: PathBuf,
}

impl DirContentStore {
    /// Open (or create) a blob directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn blob_path(&self, cid: &Cid) -> PathBuf {
        self.dir.join(cid.digest().to_hex())
    }

    /// Path of the blob backing a CID, whether or not it exists.
    pub fn path_of(&self, cid: &Cid) -> PathBuf {
        self.blob_path(cid)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("blob"),
            process::id()
        ));
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl ContentStore for DirContentStore {
    fn put(&self, bytes: &[u8], codec: Codec) -> Result<Cid> {
        let cid = Cid::of(codec, bytes);
        let path = self.blob_path(&cid);
        if !path.exists() {
            self.write_atomic(&path, bytes)?;
            debug!(cid = %cid, len = bytes.len(), "stored blob");
        }
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Option<Bytes>> {
        match fs::read(self.blob_path(cid)) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blob_path(cid).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = DirContentStore::open(dir.path()).unwrap();

        let cid = store.put(b"payload bytes", Codec::Raw).unwrap();
        assert!(store.has(&cid).unwrap());
        assert_eq!(
            store.get(&cid).unwrap().unwrap().as_ref(),
            b"payload bytes"
        );
    }

    #[test]
    fn test_put_idempotent() {
        let dir = tempdir().unwrap();
        let store = DirContentStore::open(dir.path()).unwrap();

        let c1 = store.put(b"same", Codec::Raw).unwrap();
        let c2 = store.put(b"same", Codec::Raw).unwrap();
        assert_eq!(c1, c2);

        let blobs: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(blobs.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let dir = tempdir().unwrap();
        let store = DirContentStore::open(dir.path()).unwrap();
        let cid = Cid::of(Codec::Raw, b"never stored");
        assert!(store.get(&cid).unwrap().is_none());
        assert!(!store.has(&cid).unwrap());
    }

    #[test]
    fn test_blob_named_by_hex_digest() {
        let dir = tempdir().unwrap();
        let store = DirContentStore::open(dir.path()).unwrap();
        let cid = store.put(b"named", Codec::Raw).unwrap();
        assert!(dir.path().join(cid.digest().to_hex()).exists());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let cid = {
            let store = DirContentStore::open(dir.path()).unwrap();
            store.put(b"durable", Codec::Raw).unwrap()
        };
        let store = DirContentStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&cid).unwrap().unwrap().as_ref(), b"durable");
    }
}
