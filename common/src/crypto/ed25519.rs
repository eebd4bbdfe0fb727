//! Ed25519 keys used to authorize ledger transactions.
//!
//! Keys are accepted either as raw 32-byte hex or in the DER encoding the
//! ledger tooling prints (`302e0201...` for private keys, `302a3005...` for
//! public keys). Public keys render in DER so they compare equal to what the
//! ledger reports for submit and admin keys.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of Ed25519 private key in bytes.
pub const PRIVATE_KEY_SIZE: usize = SECRET_KEY_LENGTH;

/// Size of Ed25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = SIGNATURE_LENGTH;

/// DER header (PKCS#8) preceding a raw Ed25519 private key.
pub const PRIVATE_KEY_DER_PREFIX: &str = "302e020100300506032b657004220420";

/// DER header (SubjectPublicKeyInfo) preceding a raw Ed25519 public key.
pub const PUBLIC_KEY_DER_PREFIX: &str = "302a300506032b6570032100";

/// Error types for key handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid private key length: expected {}, got {}", PRIVATE_KEY_SIZE, _0)]
    InvalidPrivateKeyLength(usize),

    #[error("Invalid public key length: expected {}, got {}", PUBLIC_KEY_SIZE, _0)]
    InvalidPublicKeyLength(usize),

    #[error("Invalid signature length: expected {}, got {}", SIGNATURE_SIZE, _0)]
    InvalidSignatureLength(usize),

    #[error("Failed to parse public key")]
    InvalidPublicKey,

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Invalid hex string: {0}")]
    HexError(String),
}

fn decode_hex(s: &str) -> Result<Vec<u8>, KeyError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| KeyError::HexError(e.to_string()))
}

/// Ed25519 private key.
///
/// The key material is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    #[zeroize(skip)]
    signing_key: SigningKey,
}

impl PrivateKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self::from_rng(&mut rand::rngs::OsRng)
    }

    /// Derive a key from the given RNG; seeded RNGs give reproducible keys.
    pub fn from_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes: [u8; PRIVATE_KEY_SIZE] = rng.gen();
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    pub fn from_bytes(bytes: &[u8; PRIVATE_KEY_SIZE]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Parse raw (64 hex chars) or DER encoded (96 hex chars) hex.
    pub fn from_str_ed25519(s: &str) -> Result<Self, KeyError> {
        let mut bytes = decode_hex(s)?;
        let prefix_len = PRIVATE_KEY_DER_PREFIX.len() / 2;
        let raw = if bytes.len() == prefix_len + PRIVATE_KEY_SIZE
            && hex::encode(&bytes[..prefix_len]) == PRIVATE_KEY_DER_PREFIX
        {
            &bytes[prefix_len..]
        } else {
            &bytes[..]
        };

        let result = <[u8; PRIVATE_KEY_SIZE]>::try_from(raw)
            .map(|raw| Self::from_bytes(&raw))
            .map_err(|_| KeyError::InvalidPrivateKeyLength(raw.len()));
        bytes.zeroize();
        result
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Raw key bytes as hex.
    pub fn to_raw_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// DER encoded hex, the form the ledger tooling prints.
    pub fn to_der_hex(&self) -> String {
        format!("{}{}", PRIVATE_KEY_DER_PREFIX, self.to_raw_hex())
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_ed25519(s)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse raw or DER encoded hex.
    pub fn from_str_ed25519(s: &str) -> Result<Self, KeyError> {
        let bytes = decode_hex(s)?;
        let prefix_len = PUBLIC_KEY_DER_PREFIX.len() / 2;
        let raw = if bytes.len() == prefix_len + PUBLIC_KEY_SIZE
            && hex::encode(&bytes[..prefix_len]) == PUBLIC_KEY_DER_PREFIX
        {
            &bytes[prefix_len..]
        } else {
            &bytes[..]
        };

        let raw: [u8; PUBLIC_KEY_SIZE] = raw
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKeyLength(raw.len()))?;
        VerifyingKey::from_bytes(&raw).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_raw_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_der_hex(&self) -> String {
        format!("{}{}", PUBLIC_KEY_DER_PREFIX, self.to_raw_hex())
    }

    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), KeyError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| KeyError::InvalidPublicKey)?;
        let dalek_sig = DalekSignature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &dalek_sig)
            .map_err(|_| KeyError::VerificationFailed)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_ed25519(s)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_raw_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_der_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_der_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str_ed25519(&s).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_SIZE] = slice
            .try_into()
            .map_err(|_| KeyError::InvalidSignatureLength(slice.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_sign_and_verify() {
        let key = PrivateKey::generate();
        let signature = key.sign(b"transfer");
        assert!(key.public_key().verify(b"transfer", &signature).is_ok());
        assert_eq!(
            key.public_key().verify(b"tampered", &signature),
            Err(KeyError::VerificationFailed)
        );
    }

    #[test]
    fn test_der_and_raw_parse_to_same_key() {
        let key = PrivateKey::generate();
        let from_der = PrivateKey::from_str_ed25519(&key.to_der_hex()).unwrap();
        let from_raw = PrivateKey::from_str_ed25519(&key.to_raw_hex()).unwrap();
        assert_eq!(from_der.public_key(), key.public_key());
        assert_eq!(from_raw.public_key(), key.public_key());

        let public = key.public_key();
        assert_eq!(PublicKey::from_str(&public.to_string()).unwrap(), public);
        assert_eq!(PublicKey::from_str(&public.to_raw_hex()).unwrap(), public);
    }

    #[test]
    fn test_invalid_lengths() {
        assert_eq!(
            PrivateKey::from_str_ed25519("abcd").unwrap_err(),
            KeyError::InvalidPrivateKeyLength(2)
        );
        assert!(matches!(
            PublicKey::from_str_ed25519("zz"),
            Err(KeyError::HexError(_))
        ));
    }

    #[test]
    fn test_seeded_keys_are_reproducible() {
        let a = PrivateKey::from_rng(&mut StdRng::seed_from_u64(7));
        let b = PrivateKey::from_rng(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let key = PrivateKey::generate();
        let debug = format!("{:?}", key);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&key.to_raw_hex()));
    }
}
