//! Deterministic replay and tamper detection.

use std::fs;

use vault_ledger::{Defect, ReplayProducer, Value, VaultError};
use vault_ledger_core::Sha256Digest;
use vault_ledger_testkit::fixtures::producer_state;
use vault_ledger_testkit::TestVault;

fn metadata(seed: u64) -> Value {
    Value::Map(vec![(Value::text("seed"), Value::uint(seed))])
}

/// Run a producer from `seed` for `ticks` checkpoints, returning the head
/// chain hash.
fn run_producer(fixture: &TestVault, stream: &str, seed: u64, ticks: u64) -> Sha256Digest {
    let mut head = None;
    for tick in 1..=ticks {
        let snapshot = fixture
            .vault
            .checkpoint(stream, tick, &producer_state(seed, tick), &metadata(seed))
            .unwrap();
        head = Some(snapshot.chain_hash);
    }
    head.unwrap()
}

#[test]
fn same_seed_same_head_hash() {
    let first = TestVault::new();
    let head_a = run_producer(&first, "sim-42", 42, 10);

    // Independent vault, fresh directories, same seed and operations.
    let second = TestVault::new();
    let head_b = run_producer(&second, "sim-42", 42, 10);

    assert_eq!(head_a, head_b);

    // A different seed diverges immediately.
    let third = TestVault::new();
    let head_c = run_producer(&third, "sim-42", 43, 10);
    assert_ne!(head_a, head_c);
}

#[test]
fn capsule_chain_verifies_clean() {
    let fixture = TestVault::new();
    run_producer(&fixture, "sim", 42, 6);

    let report = fixture.vault.verify_capsule_chain("sim").unwrap();
    assert!(report.is_intact());
    assert_eq!(report.verdicts.len(), 6);
}

struct SeededProducer {
    seed: u64,
}

impl ReplayProducer for SeededProducer {
    fn state_at(&mut self, tick: u64) -> Result<Value, VaultError> {
        Ok(producer_state(self.seed, tick))
    }
}

#[test]
fn replay_hook_confirms_digests() {
    let fixture = TestVault::new();
    run_producer(&fixture, "sim", 42, 5);

    let mut honest = SeededProducer { seed: 42 };
    let report = fixture
        .vault
        .verify_capsule_chain_with("sim", &mut honest)
        .unwrap();
    assert!(report.is_intact());
}

#[test]
fn replay_hook_detects_divergence() {
    let fixture = TestVault::new();
    run_producer(&fixture, "sim", 42, 5);

    let mut impostor = SeededProducer { seed: 7 };
    let report = fixture
        .vault
        .verify_capsule_chain_with("sim", &mut impostor)
        .unwrap();
    assert!(!report.is_intact());
    assert!(report
        .defects()
        .all(|(_, d)| matches!(d, Defect::ReplayDivergence { .. })));
}

#[test]
fn tampered_blob_reports_mismatch_and_verification_completes() {
    let fixture = TestVault::new();
    run_producer(&fixture, "sim", 42, 5);

    // Flip one byte inside the capsule blob referenced by entry 2.
    let entries: Vec<_> = fixture
        .vault
        .stream_scan("sim", 0)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let victim = &entries[2];
    let blob = fixture.blob_path(&victim.payload_cid.digest().to_hex());
    let mut bytes = fs::read(&blob).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    fs::write(&blob, &bytes).unwrap();

    let report = fixture.vault.verify_stream("sim").unwrap();
    assert!(!report.is_intact());
    assert_eq!(report.verdicts.len(), 5, "verification walks to the end");

    let flagged: Vec<_> = report.defects().collect();
    assert!(flagged
        .iter()
        .any(|(seq, d)| *seq == Some(2) && matches!(d, Defect::PayloadDigestMismatch { .. })));
    // Entries after the tampered one stay individually valid; the chain
    // defect is localized to the mutated payload.
    assert!(report.verdicts[3].is_ok());
    assert!(report.verdicts[4].is_ok());
}

#[test]
fn tampered_log_frame_reports_corrupt_entry_and_downstream_diagnostics() {
    let fixture = TestVault::new();
    let path = fixture.stream_path("sim");
    run_producer(&fixture, "sim", 42, 5);
    drop(fixture.vault);

    // Flip a byte inside the third frame's body, after the committed
    // prefix (frame offsets found by walking headers).
    let mut bytes = fs::read(&path).unwrap();
    let mut offset = 0usize;
    for _ in 0..2 {
        let len = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap()) as usize;
        offset += 12 + len;
    }
    bytes[offset + 12 + 8] ^= 0xff;
    fs::write(&path, &bytes).unwrap();

    let log = vault_ledger::FileAppendLog::open(path.parent().unwrap(), true).unwrap();
    let content = vault_ledger::DirContentStore::open(
        path.parent().unwrap().parent().unwrap().join("blobs"),
    )
    .unwrap();
    let verifier = vault_ledger::verify::ReplayVerifier::new(
        std::sync::Arc::new(content),
        std::sync::Arc::new(log),
    );

    let report = verifier.verify_stream("sim").unwrap();
    assert!(!report.is_intact());

    // The corrupt frame is reported, the walk continues, and the first
    // entry after the gap carries broken-chain diagnostics.
    let corrupt: Vec<_> = report
        .defects()
        .filter(|(_, d)| matches!(d, Defect::CorruptEntry(_)))
        .collect();
    assert_eq!(corrupt.len(), 1);
    assert!(report
        .defects()
        .any(|(seq, d)| seq == Some(3)
            && matches!(d, Defect::SeqDiscontinuity { .. } | Defect::PrevHashMismatch)));
    assert_eq!(report.verdicts.len(), 5);
}

#[test]
fn quarantine_halts_writers_until_reset() {
    let fixture = TestVault::new();
    run_producer(&fixture, "sim", 42, 3);

    // Break entry 1's payload, verify, and expect the stream halted.
    let entries: Vec<_> = fixture
        .vault
        .stream_scan("sim", 0)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let blob = fixture.blob_path(&entries[1].payload_cid.digest().to_hex());
    let mut bytes = fs::read(&blob).unwrap();
    bytes[0] ^= 0x01;
    fs::write(&blob, &bytes).unwrap();

    let report = fixture.vault.verify_stream("sim").unwrap();
    assert!(!report.is_intact());

    let err = fixture
        .vault
        .checkpoint("sim", 4, &producer_state(42, 4), &metadata(42))
        .unwrap_err();
    assert!(matches!(err, VaultError::StreamLocked { .. }));

    fixture.vault.reset_stream("sim").unwrap();
    // Writers resume after the operator ack. The tampered blob is still
    // wrong, but that is the verifier's finding to re-report.
    fixture
        .vault
        .checkpoint("sim", 4, &producer_state(42, 4), &metadata(42))
        .unwrap();
}
