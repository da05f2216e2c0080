//! Signed request envelope.
//!
//! Clients send the public key, salt and signature as hex strings next to
//! the JSON body. The gateway hands the envelope to
//! [`AuthSessionManager::verify_request`](crate::auth::session::AuthSessionManager::verify_request)
//! before dispatching the body.

use crate::auth::canonical::signed_message;
use crate::auth::keys::{signature_from_hex, Keypair, PublicKey, SIGNATURE_LEN};
use crate::auth::salt::Salt;
use crate::core::error::{AuthFailureReason, CofferError, CofferResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sign a request body against a salt.
pub fn sign_request(keypair: &Keypair, body: &Value, salt: &Salt) -> [u8; SIGNATURE_LEN] {
    keypair.sign(&signed_message(body, salt.as_bytes()))
}

/// A request as produced by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Hex ed25519 public key.
    pub public_key: String,
    /// Hex salt the signature was made against.
    pub salt: String,
    /// Hex signature over the canonical body followed by the salt.
    pub signature: String,
    /// Request body.
    pub body: Value,
}

/// Envelope fields after hex decoding.
#[derive(Debug, Clone)]
pub struct DecodedRequest {
    pub public_key: PublicKey,
    pub salt: Salt,
    pub signature: [u8; SIGNATURE_LEN],
}

impl SignedRequest {
    /// Build and sign an envelope.
    pub fn sign(keypair: &Keypair, salt: &Salt, body: Value) -> Self {
        let signature = sign_request(keypair, &body, salt);
        Self {
            public_key: keypair.public_key().to_hex(),
            salt: salt.to_hex(),
            signature: hex::encode(signature),
            body,
        }
    }

    /// Decode the hex fields.
    pub fn decode(&self) -> CofferResult<DecodedRequest> {
        Ok(DecodedRequest {
            public_key: PublicKey::from_hex(&self.public_key)?,
            salt: Salt::from_hex(&self.salt)?,
            signature: signature_from_hex(&self.signature)?,
        })
    }

    /// Parse an envelope from JSON text.
    pub fn from_json(text: &str) -> CofferResult<Self> {
        serde_json::from_str(text)
            .map_err(|_| CofferError::auth(AuthFailureReason::MalformedEnvelope))
    }

    /// Render as JSON text.
    pub fn to_json(&self) -> CofferResult<String> {
        serde_json::to_string(self).map_err(|e| CofferError::Internal {
            message: e.to_string(),
        })
    }
}
