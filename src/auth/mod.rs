//! Signed-request authentication.
//!
//! This module contains:
//! - [`keys`] - Passphrase-derived ed25519 keypairs
//! - [`salt`] - Single-use salts
//! - [`canonical`] - Canonical request body bytes
//! - [`envelope`] - The signed request envelope
//! - [`session`] - Salt issuance, rotation and verification

pub mod canonical;
pub mod envelope;
pub mod keys;
pub mod salt;
pub mod session;

pub use envelope::{sign_request, SignedRequest};
pub use keys::{Keypair, PublicKey};
pub use salt::Salt;
pub use session::{AuthSessionManager, SignupReceipt, Verified};
