//! Golden canonicalization vectors.
//!
//! Every implementation of the ledger must reproduce these bytes and
//! digests exactly; they pin the canonical encoding across versions.

use vault_ledger_core::{canonical_bytes, Sha256Digest, Value};

/// One golden case: input JSON, expected canonical bytes, expected digest.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    pub name: &'static str,
    pub input_json: &'static str,
    pub canonical: &'static str,
    pub digest_hex: &'static str,
}

/// All golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "sorted_keys",
            input_json: r#"{"b":1,"a":[2,3]}"#,
            canonical: r#"{"a":[2,3],"b":1}"#,
            digest_hex: "2aae3bfa906be39530e7d7a4aa90a7e6d4f29c33e3ac80e1c3b05598c5953c04",
        },
        GoldenVector {
            name: "empty_map",
            input_json: "{}",
            canonical: "{}",
            digest_hex: "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
        },
        GoldenVector {
            name: "single_int",
            input_json: r#"{"n":0}"#,
            canonical: r#"{"n":0}"#,
            digest_hex: "f3013f933b9fb80ab6d995e7ad9da36f683837ba1d81e950c943d40111eac2f0",
        },
        GoldenVector {
            name: "nested_and_null",
            input_json: r#"{"z":null,"y":{"b":false,"a":true},"x":[-1,0,1]}"#,
            canonical: r#"{"x":[-1,0,1],"y":{"a":true,"b":false},"z":null}"#,
            digest_hex: "2ceeb3719bf9e7fab5f9dea0eda4d786134140085d73d038d16b7a3d42283e2a",
        },
        GoldenVector {
            name: "unicode_passthrough",
            input_json: "{\"greeting\":\"h\u{00e9}llo\"}",
            canonical: "{\"greeting\":\"h\u{00e9}llo\"}",
            digest_hex: "7b5a3765d9c507d10d4909802de57167112ba785008952b38ef3554fa48eb669",
        },
        GoldenVector {
            name: "max_u64",
            input_json: r#"{"n":18446744073709551615}"#,
            canonical: r#"{"n":18446744073709551615}"#,
            digest_hex: "71aad85172d3c45bb3f3379466473927538d2759522c5446febca32fba09c17f",
        },
        GoldenVector {
            name: "min_i64",
            input_json: r#"{"n":-9223372036854775808}"#,
            canonical: r#"{"n":-9223372036854775808}"#,
            digest_hex: "bef2d002efa1e5cb6c97e2738e7f311f87d3bbb75dd3a860d55052aa0128e978",
        },
        GoldenVector {
            name: "escapes",
            input_json: r#"{"s":"line\nbreak\ttab \"quote\" back\\slash"}"#,
            canonical: r#"{"s":"line\nbreak\ttab \"quote\" back\\slash"}"#,
            digest_hex: "e3abd3da9f9075a4a6630f48d0ad3f3c18467071b10986fe21a0dc7941e42758",
        },
    ]
}

/// Run a vector through the canonicalizer, returning (bytes, digest hex).
pub fn evaluate(vector: &GoldenVector) -> (Vec<u8>, String) {
    let parsed: serde_json::Value =
        serde_json::from_str(vector.input_json).expect("vector input parses");
    let record = Value::from_json(&parsed).expect("vector input converts");
    let bytes = canonical_bytes(&record).expect("vector canonicalizes");
    let digest = Sha256Digest::hash(&bytes).to_hex();
    (bytes, digest)
}
