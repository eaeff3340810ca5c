//! Canonical JSON encoding for deterministic serialization.
//!
//! This module implements a JCS subset (RFC 8785 restricted to integer
//! scalars):
//! - Map keys sorted lexicographically by Unicode code point
//! - Separators are exactly `,` and `:`, no insignificant whitespace
//! - Strings use the minimal-length JSON escapes; everything else is UTF-8
//! - Integers as shortest decimal in `[i64::MIN, u64::MAX]`, never floats
//!
//! The canonical encoding is critical: it ensures that structurally equal
//! records produce identical bytes (and thus identical digests) across all
//! platforms.

use crate::error::CanonicalError;
use crate::value::Value;

/// Recursion bound for nested records.
pub const MAX_DEPTH: usize = 128;

const INT_MIN: i128 = i64::MIN as i128;
const INT_MAX: i128 = u64::MAX as i128;

/// Encode a record to canonical bytes.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value, 0)?;
    Ok(buf)
}

/// Parse canonical (or any JSON) bytes back into a record.
///
/// Floats in the input are rejected, so `parse_canonical(canonical_bytes(r))`
/// always reproduces `r` up to map-key order, and re-encoding is
/// byte-identical.
pub fn parse_canonical(bytes: &[u8]) -> Result<Value, CanonicalError> {
    let json: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CanonicalError::Malformed(e.to_string()))?;
    Value::from_json(&json)
}

/// Recursively encode a value.
fn encode_value(buf: &mut Vec<u8>, value: &Value, depth: usize) -> Result<(), CanonicalError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::CycleDetected);
    }
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Int(n) => encode_int(buf, *n)?,
        Value::Text(s) => encode_string(buf, s),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                encode_value(buf, item, depth + 1)?;
            }
            buf.push(b']');
        }
        Value::Map(entries) => encode_map(buf, entries, depth)?,
    }
    Ok(())
}

/// Encode an integer as shortest decimal.
fn encode_int(buf: &mut Vec<u8>, n: i128) -> Result<(), CanonicalError> {
    if !(INT_MIN..=INT_MAX).contains(&n) {
        return Err(CanonicalError::InvalidScalar(n.to_string()));
    }
    buf.extend_from_slice(n.to_string().as_bytes());
    Ok(())
}

/// Encode a string with minimal JSON escapes.
///
/// `\"`, `\\`, `\b`, `\f`, `\n`, `\r`, `\t` where they apply; `\u00xx` for
/// remaining control characters; every other code point as raw UTF-8.
fn encode_string(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => buf.extend_from_slice(b"\\\""),
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\u{0008}' => buf.extend_from_slice(b"\\b"),
            '\u{000c}' => buf.extend_from_slice(b"\\f"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            '\t' => buf.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                buf.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut utf8 = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
    buf.push(b'"');
}

/// Encode a map canonically: keys sorted by code point, duplicates rejected.
fn encode_map(
    buf: &mut Vec<u8>,
    entries: &[(Value, Value)],
    depth: usize,
) -> Result<(), CanonicalError> {
    let mut sorted: Vec<(&str, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let key = match k {
            Value::Text(s) => s.as_str(),
            _ => return Err(CanonicalError::NonStringKey),
        };
        sorted.push((key, v));
    }

    // UTF-8 byte order equals code-point order.
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    for pair in sorted.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(CanonicalError::DuplicateKey(pair[0].0.to_string()));
        }
    }

    buf.push(b'{');
    for (i, (key, value)) in sorted.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        encode_string(buf, key);
        buf.push(b':');
        encode_value(buf, value, depth + 1)?;
    }
    buf.push(b'}');
    Ok(())
}
