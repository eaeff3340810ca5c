//! Content identifiers: CIDv1 with a SHA-256 multihash.
//!
//! Binary layout: `0x01 || varint(codec) || 0x12 || 0x20 || digest`.
//! String form is multibase `b` + RFC 4648 base32 (lowercase, no padding).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Sha256Digest;
use crate::error::CoreError;

const CID_VERSION: u8 = 0x01;
const MULTIHASH_SHA2_256: u8 = 0x12;
const MULTIHASH_LEN: u8 = 0x20;

/// Payload codec tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    /// Opaque bytes (0x55). The default.
    #[default]
    Raw,
    /// Canonical JSON (0x0200).
    Json,
}

impl Codec {
    /// The multicodec tag.
    pub fn tag(self) -> u64 {
        match self {
            Codec::Raw => 0x55,
            Codec::Json => 0x0200,
        }
    }

    /// Parse a multicodec tag.
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0x55 => Some(Codec::Raw),
            0x0200 => Some(Codec::Json),
            _ => None,
        }
    }
}

/// A content identifier: codec tag plus SHA-256 digest.
///
/// Two payloads have equal CIDs iff their bytes are identical and they were
/// tagged with the same codec.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cid {
    codec: Codec,
    digest: Sha256Digest,
}

impl Cid {
    /// Build from an existing digest.
    pub const fn new(codec: Codec, digest: Sha256Digest) -> Self {
        Self { codec, digest }
    }

    /// Hash payload bytes and build the CID.
    pub fn of(codec: Codec, bytes: &[u8]) -> Self {
        Self::new(codec, Sha256Digest::hash(bytes))
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// Binary CID bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(37);
        buf.push(CID_VERSION);
        varint_encode(self.codec.tag(), &mut buf);
        buf.push(MULTIHASH_SHA2_256);
        buf.push(MULTIHASH_LEN);
        buf.extend_from_slice(self.digest.as_bytes());
        buf
    }

    /// Parse binary CID bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let malformed = |reason: &str| CoreError::MalformedCid(reason.to_string());

        if bytes.first() != Some(&CID_VERSION) {
            return Err(malformed("unsupported cid version"));
        }
        let (tag, consumed) = varint_decode(&bytes[1..]).ok_or_else(|| malformed("bad codec"))?;
        let codec = Codec::from_tag(tag).ok_or_else(|| malformed("unknown codec"))?;

        let rest = &bytes[1 + consumed..];
        if rest.len() != 34 || rest[0] != MULTIHASH_SHA2_256 || rest[1] != MULTIHASH_LEN {
            return Err(malformed("bad multihash"));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&rest[2..]);
        Ok(Self::new(codec, Sha256Digest::from_bytes(digest)))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", base32_encode(&self.to_bytes()))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self)
    }
}

impl FromStr for Cid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('b')
            .ok_or_else(|| CoreError::MalformedCid("missing multibase prefix".into()))?;
        let bytes = base32_decode(rest)
            .ok_or_else(|| CoreError::MalformedCid("invalid base32".into()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Cid::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Unsigned LEB128 encoding.
fn varint_encode(mut n: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Unsigned LEB128 decoding. Returns (value, bytes consumed).
fn varint_decode(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate().take(10) {
        if i == 9 && byte > 0x01 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// RFC 4648 base32, lowercase, no padding.
fn base32_encode(data: &[u8]) -> String {
    let mut result = String::new();
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in data {
        buffer = (buffer << 8) | u64::from(byte);
        bits_in_buffer += 8;

        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let index = ((buffer >> bits_in_buffer) & 0x1f) as usize;
            result.push(BASE32_ALPHABET[index] as char);
        }
    }

    if bits_in_buffer > 0 {
        let index = ((buffer << (5 - bits_in_buffer)) & 0x1f) as usize;
        result.push(BASE32_ALPHABET[index] as char);
    }

    result
}

/// Inverse of [`base32_encode`]. Returns `None` on characters outside the
/// alphabet or non-zero trailing bits.
fn base32_decode(s: &str) -> Option<Vec<u8>> {
    let mut result = Vec::with_capacity(s.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for ch in s.bytes() {
        let index = BASE32_ALPHABET.iter().position(|&a| a == ch)? as u64;
        buffer = (buffer << 5) | index;
        bits_in_buffer += 5;

        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            result.push(((buffer >> bits_in_buffer) & 0xff) as u8);
        }
    }

    if buffer & ((1 << bits_in_buffer) - 1) != 0 {
        return None;
    }
    Some(result)
}
