//! Proptest strategies for arbitrary records.

use proptest::collection::vec;
use proptest::prelude::*;
use vault_ledger_core::Value;

/// Scalar leaves: null, bools, in-range integers, short unicode text.
pub fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Int(n as i128)),
        any::<u64>().prop_map(|n| Value::Int(n as i128)),
        "\\PC{0,24}".prop_map(Value::Text),
    ]
}

/// Arbitrary record trees up to 4 levels deep with unique string keys.
pub fn arb_record() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..6).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,8}", inner, 0..6).prop_map(|map| {
                Value::Map(
                    map.into_iter()
                        .map(|(k, v)| (Value::Text(k), v))
                        .collect(),
                )
            }),
        ]
    })
}

/// Arbitrary top-level records (always maps, like real producer payloads).
pub fn arb_top_level() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-z_]{1,10}", arb_record(), 1..6).prop_map(|map| {
        Value::Map(
            map.into_iter()
                .map(|(k, v)| (Value::Text(k), v))
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_ledger_core::{canonical_bytes, parse_canonical};

    proptest! {
        #[test]
        fn canonical_bytes_deterministic(record in arb_top_level()) {
            let a = canonical_bytes(&record).unwrap();
            let b = canonical_bytes(&record).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn roundtrip_stable(record in arb_top_level()) {
            let once = canonical_bytes(&record).unwrap();
            let reparsed = parse_canonical(&once).unwrap();
            let twice = canonical_bytes(&reparsed).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn key_order_is_input_independent(record in arb_top_level()) {
            // Reversing map entry order must not change canonical bytes.
            let reversed = reverse_maps(&record);
            prop_assert_eq!(
                canonical_bytes(&record).unwrap(),
                canonical_bytes(&reversed).unwrap()
            );
        }
    }

    fn reverse_maps(value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.iter().map(reverse_maps).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .rev()
                    .map(|(k, v)| (k.clone(), reverse_maps(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
