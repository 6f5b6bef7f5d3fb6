//! Ed25519 keys and signatures.
//!
//! Wallet contracts verify an Ed25519 signature over a 32-byte
//! representation hash. Networks that enable signature domains mix a
//! 32-bit *signature id* into the signed data: the id is prefixed in
//! big-endian order to the hash before signing, so a message signed for
//! one network does not verify on another.

use ed25519_dalek::{Signer as _, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::constants::SIGNATURE_LEN;
use crate::error::CryptoError;
use crate::traits::Signer;

/// Ed25519 keypair.
///
/// Wraps [`ed25519_dalek::SigningKey`]. The secret key is zeroized on drop
/// by the underlying library.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    /// Create a keypair from a hex-encoded 32-byte secret.
    pub fn from_secret_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))?;
        Ok(Self::from_secret_bytes(bytes))
    }

    /// Derive the public key from this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Get the raw secret key bytes (32 bytes). Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign raw data, optionally bound to a signature domain.
    pub fn sign_raw(&self, data: &[u8], signature_id: Option<i32>) -> Signature {
        let data = extend_signature_with_id(data, signature_id);
        Signature(self.signing_key.sign(&data).to_bytes())
    }
}

impl Signer for KeyPair {
    fn public_key(&self) -> PublicKey {
        KeyPair::public_key(self)
    }

    fn sign(&self, data: &[u8], signature_id: Option<i32>) -> Signature {
        self.sign_raw(data, signature_id)
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.secret_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key of a wallet owner.
#[derive(Clone, Copy)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// Get the raw public key bytes (32 bytes).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verify a signature produced by [`KeyPair::sign_raw`] with the same signature id.
    pub fn verify(
        &self,
        data: &[u8],
        signature: &Signature,
        signature_id: Option<i32>,
    ) -> Result<(), CryptoError> {
        let data = extend_signature_with_id(data, signature_id);
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        self.verifying_key
            .verify(&data, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Raw 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl Signature {
    /// Signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Prefix `data` with the big-endian signature id, if any.
pub fn extend_signature_with_id(data: &[u8], signature_id: Option<i32>) -> Vec<u8> {
    match signature_id {
        Some(id) => {
            let mut extended = Vec::with_capacity(4 + data.len());
            extended.extend_from_slice(&id.to_be_bytes());
            extended.extend_from_slice(data);
            extended
        }
        None => data.to_vec(),
    }
}
