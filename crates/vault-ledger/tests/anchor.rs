//! End-to-end anchor protocol: happy path, dedup, receipts, rotation.

use vault_ledger::{verify_receipt, AnchorRequest, VaultError, ANCHOR_REQUEST_SCHEMA};
use vault_ledger_core::{Sha256Digest, SignatureBytes};
use vault_ledger_testkit::TestVault;

#[test]
fn anchor_happy_path() {
    let fixture = TestVault::new();
    let v = &fixture.vault;

    let request = AnchorRequest {
        schema_version: ANCHOR_REQUEST_SCHEMA.to_string(),
        artifact_kind: "InferenceReceipt.v1".to_string(),
        payload_hash_sha256: "6a47c1eee539c79b6ed05d4766d01831099c4043dab1431aa3a9b82018b80e7b"
            .to_string(),
        run_id: "run-X".to_string(),
        operator: "op".to_string(),
        ts: "2026-01-20T20:40:00Z".to_string(),
    };
    let receipt = v.anchor_write(&request).unwrap();

    assert_eq!(receipt.payload_hash, request.payload_hash_sha256);
    assert!(receipt.sealed);
    assert_eq!(
        receipt.vault_fingerprint,
        fixture.keypair.fingerprint().to_hex()
    );

    // anchor_hash covers the sealed receipt with anchor_hash blanked.
    let sealed_bytes = receipt.sealing_bytes(true).unwrap();
    assert_eq!(
        receipt.anchor_hash,
        Sha256Digest::hash(&sealed_bytes).to_hex()
    );

    // The signature verifies over the pre-anchor bytes.
    let pre_anchor = receipt.sealing_bytes(false).unwrap();
    let signature = SignatureBytes::from_base64url(&receipt.signature).unwrap();
    fixture
        .keypair
        .public_key()
        .verify(&pre_anchor, &signature)
        .unwrap();

    // Full verification, as a caller would do on receipt.
    verify_receipt(&receipt, &fixture.keypair.public_key()).unwrap();
}

#[test]
fn duplicate_anchor_rejected_with_single_ledger_line() {
    let fixture = TestVault::new();
    let v = &fixture.vault;
    let request = fixture.anchor_request(b"some artifact");

    v.anchor_write(&request).unwrap();
    let err = v.anchor_write(&request).unwrap_err();
    assert!(matches!(err, VaultError::DuplicateAnchor(_)));
    assert_eq!(err.http_status(), 409);

    let stream = v.anchor_stream().unwrap();
    let entries: Vec<_> = v
        .stream_scan(&stream, 0)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1, "exactly one ledger line");
}

#[test]
fn dedup_survives_restart() {
    let fixture = TestVault::new();
    let data_dir = fixture.data_dir();
    let seed_path = fixture.as_ref().join("seed.hex");
    let request = fixture.anchor_request(b"durable artifact");
    fixture.vault.anchor_write(&request).unwrap();
    drop(fixture.vault);

    // A fresh vault over the same data rebuilds the duplicate index from
    // the anchor stream.
    let reopened = vault_ledger::Vault::open(vault_ledger::VaultConfig {
        data_dir,
        anchor: vault_ledger::AnchorConfig {
            key_source: vault_ledger::KeySource::File { path: seed_path },
            stream_durable: true,
        },
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(
        reopened.anchor_write(&request),
        Err(VaultError::DuplicateAnchor(_))
    ));
}

#[test]
fn ledger_line_mirrors_receipt() {
    let fixture = TestVault::new();
    let v = &fixture.vault;
    let receipt = v.anchor_write(&fixture.anchor_request(b"artifact")).unwrap();

    let stream = v.anchor_stream().unwrap();
    let line = v.stream_record(&stream, 0).unwrap().unwrap();

    for (field, expected) in [
        ("anchor_id", receipt.anchor_id.as_str()),
        ("anchor_hash", receipt.anchor_hash.as_str()),
        ("artifact_kind", receipt.artifact_kind.as_str()),
        ("payload_hash", receipt.payload_hash.as_str()),
        ("ts", receipt.ts.as_str()),
        ("vault_fingerprint", receipt.vault_fingerprint.as_str()),
        ("signature", receipt.signature.as_str()),
        ("schema_version", "VaultLedgerLine.v1"),
    ] {
        assert_eq!(
            line.get(field).and_then(vault_ledger::Value::as_str),
            Some(expected),
            "ledger line field {field}"
        );
    }
    assert_eq!(
        line.get("sealed").and_then(vault_ledger::Value::as_bool),
        Some(true)
    );
}

#[test]
fn clock_skew_does_not_invalidate_receipts() {
    // Requests whose caller timestamps arrive out of order still anchor:
    // ts participates in the signature but never in ordering.
    let fixture = TestVault::new();
    let v = &fixture.vault;

    let mut late = fixture.anchor_request(b"first artifact");
    late.ts = "2026-03-01T00:00:00Z".to_string();
    let mut early = fixture.anchor_request(b"second artifact");
    early.ts = "2020-01-01T00:00:00Z".to_string();

    let r1 = v.anchor_write(&late).unwrap();
    let r2 = v.anchor_write(&early).unwrap();
    verify_receipt(&r1, &fixture.keypair.public_key()).unwrap();
    verify_receipt(&r2, &fixture.keypair.public_key()).unwrap();
}

#[test]
fn rotation_new_stream_old_receipts_verifiable() {
    let fixture = TestVault::new();
    let v = &fixture.vault;

    let old_key = fixture.keypair.public_key();
    let old_stream = v.anchor_stream().unwrap();
    let old_receipt = v.anchor_write(&fixture.anchor_request(b"pre-rotation")).unwrap();

    let new_keypair = vault_ledger::VaultKeypair::from_seed(&[0x77; 32]);
    v.rotate_key(new_keypair.clone()).unwrap();

    let new_stream = v.anchor_stream().unwrap();
    assert_ne!(old_stream, new_stream);

    let new_receipt = v.anchor_write(&fixture.anchor_request(b"post-rotation")).unwrap();
    assert_ne!(old_receipt.vault_fingerprint, new_receipt.vault_fingerprint);

    // Old receipts verify through the public-key archive.
    let old_fingerprint = Sha256Digest::from_hex(&old_receipt.vault_fingerprint).unwrap();
    let archived = v.archived_key(&old_fingerprint).unwrap().unwrap();
    assert_eq!(archived, old_key);
    verify_receipt(&old_receipt, &archived).unwrap();
    verify_receipt(&new_receipt, &new_keypair.public_key()).unwrap();
}

#[test]
fn teardown_then_write_is_key_unavailable() {
    let fixture = TestVault::new();
    let v = &fixture.vault;
    v.teardown_key();

    let err = v.anchor_write(&fixture.anchor_request(b"x")).unwrap_err();
    assert!(matches!(err, VaultError::KeyUnavailable));
    assert_eq!(err.http_status(), 500);
}
