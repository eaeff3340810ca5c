//! Cryptographic primitives: SHA-256 digests and Ed25519 signing.
//!
//! All hashes are computed over canonical bytes only. Digests render as 64
//! lowercase hex characters at API boundaries; signatures render as unpadded
//! base64url.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::CoreError;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Compute the SHA-256 digest of data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from exactly 64 lowercase hex characters.
    ///
    /// Uppercase input is rejected: the boundary form is lowercase only.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        if s.len() != 64 || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(CoreError::MalformedDigest(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|e| CoreError::MalformedDigest(e.to_string()))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Constant-time equality, for verification paths.
    pub fn ct_eq(&self, other: &Self) -> bool {
        bool::from(self.0.ct_eq(&other.0))
    }

    /// The zero digest (sentinel value).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Sha256Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Sha256Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VaultPublicKey(pub [u8; 32]);

impl VaultPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidPublicKey)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Self(arr))
    }

    /// The vault fingerprint: SHA-256 of the raw public key bytes.
    pub fn fingerprint(&self) -> Sha256Digest {
        Sha256Digest::hash(&self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = DalekSignature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for VaultPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pubkey({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for VaultPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; 64]);

impl SignatureBytes {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Boundary form: unpadded base64url.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Parse from unpadded base64url.
    pub fn from_base64url(s: &str) -> Result<Self, CoreError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| CoreError::MalformedSignature(e.to_string()))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CoreError::MalformedSignature("not 64 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sig({}...)", &self.to_base64url()[..12])
    }
}

impl AsRef<[u8]> for SignatureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64url())
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SignatureBytes::from_base64url(&s).map_err(serde::de::Error::custom)
    }
}

/// An Ed25519 keypair owned by one vault instance.
///
/// The private half never leaves this type; the signing key is zeroized on
/// drop. There is deliberately no seed accessor.
#[derive(Clone)]
pub struct VaultKeypair {
    signing_key: SigningKey,
}

impl VaultKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from a 64-character hex seed, wiping the intermediate buffer.
    pub fn from_seed_hex(s: &str) -> Result<Self, CoreError> {
        let decoded = Zeroizing::new(
            hex::decode(s.trim()).map_err(|e| CoreError::MalformedDigest(e.to_string()))?,
        );
        if decoded.len() != 32 {
            return Err(CoreError::MalformedDigest("seed is not 32 bytes".into()));
        }
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&decoded);
        Ok(Self::from_seed(&seed))
    }

    /// Get the public key.
    pub fn public_key(&self) -> VaultPublicKey {
        VaultPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// The vault fingerprint of this keypair's public half.
    pub fn fingerprint(&self) -> Sha256Digest {
        self.public_key().fingerprint()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for VaultKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultKeypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = VaultKeypair::generate();
        let message = b"hello world";
        let signature = keypair.sign(message);

        keypair.public_key().verify(message, &signature).unwrap();

        let tampered = b"hello worlD";
        assert!(keypair.public_key().verify(tampered, &signature).is_err());
    }

    #[test]
    fn test_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = VaultKeypair::from_seed(&seed);
        let kp2 = VaultKeypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.sign(b"x"), kp2.sign(b"x"));
    }

    #[test]
    fn test_seed_hex_roundtrip() {
        let kp1 = VaultKeypair::from_seed(&[0x07; 32]);
        let kp2 = VaultKeypair::from_seed_hex(&hex::encode([0x07u8; 32])).unwrap();
        assert_eq!(kp1.public_key(), kp2.public_key());

        assert!(VaultKeypair::from_seed_hex("abcd").is_err());
    }

    #[test]
    fn test_digest_hex_strict_lowercase() {
        let digest = Sha256Digest::hash(b"test");
        let hex = digest.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Sha256Digest::from_hex(&hex).unwrap(), digest);

        let upper = hex.to_uppercase();
        assert!(Sha256Digest::from_hex(&upper).is_err());
        assert!(Sha256Digest::from_hex("abc").is_err());
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Sha256Digest::hash(b"hello").to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_fingerprint_is_digest_of_pubkey() {
        let keypair = VaultKeypair::from_seed(&[0x42; 32]);
        let pk = keypair.public_key();
        assert_eq!(keypair.fingerprint(), Sha256Digest::hash(pk.as_bytes()));
    }

    #[test]
    fn test_signature_base64url_roundtrip() {
        let keypair = VaultKeypair::from_seed(&[0x01; 32]);
        let sig = keypair.sign(b"payload");
        let encoded = sig.to_base64url();
        assert!(!encoded.contains('='));
        assert_eq!(SignatureBytes::from_base64url(&encoded).unwrap(), sig);
    }

    #[test]
    fn test_constant_time_digest_eq() {
        let a = Sha256Digest::hash(b"a");
        let b = Sha256Digest::hash(b"b");
        assert!(a.ct_eq(&a));
        assert!(!a.ct_eq(&b));
    }
}
