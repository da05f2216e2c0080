//! Passphrase-derived ed25519 keypairs.
//!
//! The signing seed is SHA-512 of the passphrase truncated to 32 bytes, so
//! the same passphrase always reproduces the same keypair. Key strength is
//! therefore bounded by passphrase strength; there is no stretching or salt.

use crate::core::error::{AuthFailureReason, CofferError, CofferResult};
use crate::store::tenant::PUBLIC_KEY_LEN;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha512};

/// Length of an ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// An ed25519 public key. Its hex form is the tenant id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes, rejecting points that are not valid keys.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> CofferResult<Self> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| CofferError::auth(AuthFailureReason::MalformedEnvelope))?;
        Ok(Self(bytes))
    }

    /// Decode from hex.
    pub fn from_hex(encoded: &str) -> CofferResult<Self> {
        let bytes: [u8; PUBLIC_KEY_LEN] = hex::decode(encoded)
            .ok()
            .and_then(|raw| raw.try_into().ok())
            .ok_or_else(|| CofferError::auth(AuthFailureReason::MalformedEnvelope))?;
        Self::from_bytes(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex, used as the tenant id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LEN]) -> CofferResult<()> {
        let verifying_key = VerifyingKey::from_bytes(&self.0)
            .map_err(|_| CofferError::auth(AuthFailureReason::MalformedEnvelope))?;
        let signature = Signature::from_bytes(signature);
        verifying_key
            .verify(message, &signature)
            .map_err(|_| CofferError::auth(AuthFailureReason::BadSignature))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A signing keypair.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Derive a keypair from a passphrase.
    pub fn derive(passphrase: &str) -> CofferResult<Self> {
        if passphrase.is_empty() {
            return Err(CofferError::invalid_request("passphrase must not be empty"));
        }
        let digest = Sha512::digest(passphrase.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest[..32]);
        Ok(Self::from_seed(seed))
    }

    /// Create from a 32-byte secret seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Generate a random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Secret seed.
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Decode a hex signature.
pub fn signature_from_hex(encoded: &str) -> CofferResult<[u8; SIGNATURE_LEN]> {
    hex::decode(encoded)
        .ok()
        .and_then(|raw| raw.try_into().ok())
        .ok_or_else(|| CofferError::auth(AuthFailureReason::MalformedEnvelope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = Keypair::derive("correct horse battery staple").unwrap();
        let b = Keypair::derive("correct horse battery staple").unwrap();
        let c = Keypair::derive("another passphrase").unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.to_seed(), b.to_seed());
        assert_ne!(a.public_key(), c.public_key());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(Keypair::derive("").is_err());
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(a.to_seed(), b.to_seed());
    }

    #[test]
    fn test_sign_verify() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"payload");
        assert!(keypair.public_key().verify(b"payload", &signature).is_ok());

        let err = keypair.public_key().verify(b"tampered", &signature).unwrap_err();
        assert_eq!(err.auth_reason(), Some(AuthFailureReason::BadSignature));
    }

    #[test]
    fn test_hex_roundtrip_and_malformed() {
        let keypair = Keypair::generate();
        let hex = keypair.public_key().to_hex();
        assert_eq!(PublicKey::from_hex(&hex).unwrap(), keypair.public_key());
        assert!(PublicKey::from_hex("abcd").is_err());
        assert!(signature_from_hex("00").is_err());
    }
}
