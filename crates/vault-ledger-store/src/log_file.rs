//! File-backed append log: one CRC-framed log file per stream.
//!
//! Frame layout: `magic(u32 LE) || len(u32 LE) || crc32c(u32 LE) || body`,
//! body = JSON of `{entry, record}`. The CRC covers the body.
//!
//! On open, a partially written trailing frame is truncated so the tip is
//! always a fully committed entry. A complete frame with a bad checksum is
//! not a torn write; it quarantines the stream instead of being repaired.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vault_ledger_core::{canonical_bytes, chain, ChainEntry, Cid, Sha256Digest, Value};

use crate::error::{Result, StoreError};
use crate::memory::now_millis;
use crate::traits::AppendLog;

const FRAME_MAGIC: u32 = 0x564c_4631; // "VLF1"
const FRAME_HEADER_LEN: usize = 12;
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
struct StoredFrame {
    entry: ChainEntry,
    record: serde_json::Value,
}

/// File-backed [`AppendLog`].
///
/// Each stream gets `<dir>/<stream>.log` plus a `.lock` file (advisory
/// exclusive lock for the writer) and, when quarantined, a `.broken`
/// marker. Appends are serialized per stream; scans open independent read
/// handles and never block writers.
pub struct FileAppendLog {
    dir: PathBuf,
    durable: bool,
    shards: RwLock<HashMap<String, Arc<Shard>>>,
}

struct Shard {
    stream: String,
    broken_path: PathBuf,
    _lock_file: File,
    writer: Mutex<Writer>,
    quarantined: AtomicBool,
}

struct Writer {
    file: File,
    tip: Option<ChainEntry>,
}

impl FileAppendLog {
    /// Open (or create) a log directory.
    ///
    /// When `durable` is set, every append is fsync'd before it is
    /// acknowledged.
    pub fn open(dir: impl Into<PathBuf>, durable: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            durable,
            shards: RwLock::new(HashMap::new()),
        })
    }

    fn log_path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{stream}.log"))
    }

    fn broken_path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{stream}.broken"))
    }

    /// Get or open the writer shard for a stream.
    fn shard(&self, stream: &str) -> Result<Arc<Shard>> {
        validate_stream_name(stream)?;

        if let Some(shard) = self.shards.read().unwrap().get(stream) {
            return Ok(Arc::clone(shard));
        }

        let mut shards = self.shards.write().unwrap();
        if let Some(shard) = shards.get(stream) {
            return Ok(Arc::clone(shard));
        }

        let lock_path = self.dir.join(format!("{stream}.lock"));
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::StreamLocked {
                stream: stream.to_string(),
                reason: "another appender holds the write lock".into(),
            })?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.log_path(stream))?;

        let broken_path = self.broken_path(stream);
        let outcome = recover(&mut file, stream)?;
        if outcome.truncate_to < outcome.file_len {
            warn!(
                stream,
                committed = outcome.truncate_to,
                torn = outcome.file_len - outcome.truncate_to,
                "truncating torn tail"
            );
            file.set_len(outcome.truncate_to)?;
            file.sync_all()?;
        }
        if outcome.defect {
            warn!(stream, "integrity defect on open, quarantining stream");
            fs::write(&broken_path, b"integrity defect detected on open\n")?;
        }
        file.seek(SeekFrom::End(0))?;

        let shard = Arc::new(Shard {
            stream: stream.to_string(),
            quarantined: AtomicBool::new(outcome.defect || broken_path.exists()),
            broken_path,
            _lock_file: lock_file,
            writer: Mutex::new(Writer {
                file,
                tip: outcome.tip,
            }),
        });
        shards.insert(stream.to_string(), Arc::clone(&shard));
        Ok(shard)
    }
}

impl AppendLog for FileAppendLog {
    fn append(&self, stream: &str, record: &Value, payload_cid: &Cid) -> Result<ChainEntry> {
        let shard = self.shard(stream)?;
        if shard.quarantined.load(Ordering::SeqCst) || shard.broken_path.exists() {
            return Err(StoreError::StreamLocked {
                stream: stream.to_string(),
                reason: "quarantined pending operator reset".into(),
            });
        }

        let record_bytes = canonical_bytes(record)?;
        let record_digest = Sha256Digest::hash(&record_bytes);
        let record_json = record
            .to_json()
            .map_err(|e| StoreError::Encoding(e.to_string()))?;

        let mut writer = shard.writer.lock().unwrap();
        let tip = writer.tip.as_ref();
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

        let body = serde_json::to_vec(&StoredFrame {
            entry: entry.clone(),
            record: record_json,
        })
        .map_err(|e| StoreError::Encoding(e.to_string()))?;
        if body.len() > MAX_BODY_BYTES {
            return Err(StoreError::Encoding(format!(
                "record of {} bytes exceeds frame limit",
                body.len()
            )));
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        frame.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32c::crc32c(&body).to_le_bytes());
        frame.extend_from_slice(&body);

        writer.file.write_all(&frame)?;
        if self.durable {
            writer.file.sync_all()?;
        }
        writer.tip = Some(entry.clone());

        debug!(stream = %shard.stream, seq, "appended entry");
        Ok(entry)
    }

    fn tip(&self, stream: &str) -> Result<Option<ChainEntry>> {
        let shard = self.shard(stream)?;
        let writer = shard.writer.lock().unwrap();
        Ok(writer.tip.clone())
    }

    fn scan(
        &self,
        stream: &str,
        from_seq: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<ChainEntry>> + Send>> {
        let iter = self.open_scan(stream, from_seq)?;
        Ok(Box::new(iter.map(|item| item.map(|(entry, _)| entry))))
    }

    fn scan_records(
        &self,
        stream: &str,
        from_seq: u64,
    ) -> Result<Box<dyn Iterator<Item = Result<(ChainEntry, Value)>> + Send>> {
        let iter = self.open_scan(stream, from_seq)?;
        Ok(Box::new(iter.map(|item| {
            item.and_then(|(entry, record)| {
                let record = Value::from_json(&record)?;
                Ok((entry, record))
            })
        })))
    }

    fn get_record(&self, stream: &str, seq: u64) -> Result<Option<Value>> {
        for item in self.open_scan(stream, seq)? {
            let (entry, record) = item?;
            if entry.seq == seq {
                return Ok(Some(Value::from_json(&record)?));
            }
        }
        Ok(None)
    }

    fn quarantine(&self, stream: &str) -> Result<()> {
        validate_stream_name(stream)?;
        fs::write(self.broken_path(stream), b"quarantined by verifier\n")?;
        if let Some(shard) = self.shards.read().unwrap().get(stream) {
            shard.quarantined.store(true, Ordering::SeqCst);
        }
        warn!(stream, "stream quarantined");
        Ok(())
    }

    fn reset(&self, stream: &str) -> Result<()> {
        validate_stream_name(stream)?;
        let path = self.broken_path(stream);
        if path.exists() {
            fs::remove_file(path)?;
        }
        if let Some(shard) = self.shards.read().unwrap().get(stream) {
            shard.quarantined.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_quarantined(&self, stream: &str) -> Result<bool> {
        validate_stream_name(stream)?;
        Ok(self.broken_path(stream).exists())
    }
}

impl FileAppendLog {
    fn open_scan(&self, stream: &str, from_seq: u64) -> Result<ScanIter> {
        validate_stream_name(stream)?;
        let path = self.log_path(stream);
        let file = match File::open(&path) {
            Ok(f) => Some(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(ScanIter {
            reader: file.map(BufReader::new),
            stream: stream.to_string(),
            offset: 0,
            from_seq,
        })
    }
}

/// Lazy frame iterator over one stream file.
///
/// A torn tail ends iteration silently (it is not yet committed); a
/// complete frame with a bad checksum or undecodable body is reported as
/// `CorruptEntry` and iteration continues at the next frame.
struct ScanIter {
    reader: Option<BufReader<File>>,
    stream: String,
    offset: u64,
    from_seq: u64,
}

impl Iterator for ScanIter {
    type Item = Result<(ChainEntry, serde_json::Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        loop {
            let frame_offset = self.offset;

            let mut header = [0u8; FRAME_HEADER_LEN];
            match read_exact_or_eof(reader, &mut header) {
                Ok(true) => {}
                Ok(false) => return None, // clean end or torn header
                Err(e) => return Some(Err(e.into())),
            }

            let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
            if magic != FRAME_MAGIC {
                return None; // framing lost past the committed region
            }
            let len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
            if len == 0 || len > MAX_BODY_BYTES {
                return None;
            }
            let expected_crc = u32::from_le_bytes(header[8..12].try_into().unwrap());

            let mut body = vec![0u8; len];
            match read_exact_or_eof(reader, &mut body) {
                Ok(true) => {}
                Ok(false) => return None, // torn body
                Err(e) => return Some(Err(e.into())),
            }
            self.offset = frame_offset + (FRAME_HEADER_LEN + len) as u64;

            if crc32c::crc32c(&body) != expected_crc {
                return Some(Err(StoreError::CorruptEntry {
                    stream: self.stream.clone(),
                    offset: frame_offset,
                    reason: "crc mismatch".into(),
                }));
            }

            let frame: StoredFrame = match serde_json::from_slice(&body) {
                Ok(f) => f,
                Err(e) => {
                    return Some(Err(StoreError::CorruptEntry {
                        stream: self.stream.clone(),
                        offset: frame_offset,
                        reason: format!("undecodable body: {e}"),
                    }));
                }
            };

            if frame.entry.seq < self.from_seq {
                continue;
            }
            return Some(Ok((frame.entry, frame.record)));
        }
    }
}

struct RecoverOutcome {
    tip: Option<ChainEntry>,
    truncate_to: u64,
    file_len: u64,
    defect: bool,
}

/// Walk the file from the start, finding the last committed frame.
fn recover(file: &mut File, stream: &str) -> Result<RecoverOutcome> {
    let file_len = file.metadata()?.len();
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(&mut *file);

    let mut tip: Option<ChainEntry> = None;
    let mut committed: u64 = 0;
    let mut offset: u64 = 0;
    let mut defect = false;

    loop {
        let mut header = [0u8; FRAME_HEADER_LEN];
        if !read_exact_or_eof(&mut reader, &mut header)? {
            break;
        }
        let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
        if magic != FRAME_MAGIC || len == 0 || len > MAX_BODY_BYTES {
            break;
        }
        let expected_crc = u32::from_le_bytes(header[8..12].try_into().unwrap());

        let mut body = vec![0u8; len];
        if !read_exact_or_eof(&mut reader, &mut body)? {
            break;
        }
        offset += (FRAME_HEADER_LEN + len) as u64;

        if crc32c::crc32c(&body) != expected_crc {
            // A complete frame with a bad checksum was committed at some
            // point: corruption, not a torn write.
            warn!(stream, offset, "committed frame failed checksum");
            defect = true;
            break;
        }
        let frame: StoredFrame = match serde_json::from_slice(&body) {
            Ok(f) => f,
            Err(_) => {
                warn!(stream, offset, "committed frame undecodable");
                defect = true;
                break;
            }
        };

        let expected_seq = tip.as_ref().map(|e: &ChainEntry| e.seq + 1).unwrap_or(0);
        if frame.entry.seq != expected_seq {
            warn!(stream, got = frame.entry.seq, expected_seq, "sequence break");
            defect = true;
            break;
        }

        tip = Some(frame.entry);
        committed = offset;
    }

    // Only a clean scan may truncate: a defective region is preserved as
    // evidence for the verifier.
    let truncate_to = if defect { file_len } else { committed };
    Ok(RecoverOutcome {
        tip,
        truncate_to,
        file_len,
        defect,
    })
}

/// Read exactly `buf.len()` bytes. Returns `Ok(false)` on clean EOF or a
/// short (torn) read.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut read = 0;
    while read < buf.len() {
        let n = reader.read(&mut buf[read..])?;
        if n == 0 {
            return Ok(false);
        }
        read += n;
    }
    Ok(true)
}

fn validate_stream_name(stream: &str) -> Result<()> {
    let ok = !stream.is_empty()
        && stream.len() <= 200
        && !stream.starts_with('.')
        && stream
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidStreamName(stream.to_string()))
    }
}
