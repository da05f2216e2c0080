//! Single-use salts.

use crate::core::error::{AuthFailureReason, CofferError, CofferResult};
use rand::RngCore;

/// Opaque random nonce a tenant must sign its next request with.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Draw a fresh salt of `len` bytes from the thread RNG.
    pub fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode from lowercase or uppercase hex.
    pub fn from_hex(encoded: &str) -> CofferResult<Self> {
        hex::decode(encoded)
            .map(Self)
            .map_err(|_| CofferError::auth(AuthFailureReason::MalformedEnvelope))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the salt is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Salt({})", self.to_hex())
    }
}

impl std::fmt::Display for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_salts_differ() {
        let a = Salt::random(32);
        let b = Salt::random(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_decode() {
        let salt = Salt::from_hex("00ff10").unwrap();
        assert_eq!(salt.as_bytes(), &[0x00, 0xff, 0x10]);
        assert_eq!(salt.to_hex(), "00ff10");
        assert!(Salt::from_hex("zz").is_err());
    }
}
