//! Auth session manager.
//!
//! Per tenant the state moves `Unregistered -> Registered(key, salt)` and
//! then rotates the salt on every accepted request. The salt comparison and
//! the rotation happen under the tenant lock in one critical section, so no
//! two accepted requests from a tenant ever verify against the same salt.
//! Rejected requests leave the salt untouched.

use crate::auth::canonical::signed_message;
use crate::auth::envelope::SignedRequest;
use crate::auth::keys::{Keypair, PublicKey, SIGNATURE_LEN};
use crate::auth::salt::Salt;
use crate::control::placement::HostPlacement;
use crate::core::config::Config;
use crate::core::error::{AuthFailureReason, CofferError, CofferResult};
use crate::store::engine::Store;
use crate::store::tenant::Registration;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a signup.
#[derive(Debug, Clone)]
pub struct SignupReceipt {
    /// Tenant id (hex public key).
    pub tenant_id: String,
    /// Registered public key.
    pub public_key: PublicKey,
    /// Host the tenant is placed on.
    pub host: String,
    /// Salt the first request must be signed with.
    pub salt: Salt,
}

/// An accepted request.
#[derive(Debug, Clone)]
pub struct Verified {
    /// Authenticated tenant.
    pub tenant_id: String,
    /// Salt the next request must be signed with.
    pub next_salt: Salt,
}

#[derive(Debug, Default)]
struct AuthStats {
    signups: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of the auth counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthStatsSnapshot {
    pub signups: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Issues salts and verifies signed requests against the store's tenants.
#[derive(Debug)]
pub struct AuthSessionManager {
    store: Arc<Store>,
    placement: HostPlacement,
    salt_len: usize,
    stats: AuthStats,
}

impl AuthSessionManager {
    /// Create a session manager.
    pub fn new(store: Arc<Store>, placement: HostPlacement, salt_len: usize) -> Self {
        Self {
            store,
            placement,
            salt_len,
            stats: AuthStats::default(),
        }
    }

    /// Create a session manager from configuration.
    pub fn from_config(store: Arc<Store>, config: &Config) -> CofferResult<Self> {
        let placement = HostPlacement::from_config(&config.auth)?;
        Ok(Self::new(store, placement, config.auth.salt_bytes))
    }

    /// Host placement in use.
    pub fn placement(&self) -> &HostPlacement {
        &self.placement
    }

    /// Derive the keypair for a passphrase.
    pub fn derive_keypair(passphrase: &str) -> CofferResult<Keypair> {
        Keypair::derive(passphrase)
    }

    /// Derive a keypair from `passphrase` and register its public key.
    pub fn signup(&self, passphrase: &str) -> CofferResult<SignupReceipt> {
        let keypair = Keypair::derive(passphrase)?;
        self.register_public_key(&keypair.public_key())
    }

    /// Register a public key, creating its tenant.
    ///
    /// Registering the same key again returns the current salt without
    /// rotating it.
    pub fn register_public_key(&self, public_key: &PublicKey) -> CofferResult<SignupReceipt> {
        let tenant_id = public_key.to_hex();
        let (salt, created) = self.store.with_tenant_or_create(&tenant_id, |tenant| {
            match tenant.registration() {
                Some(existing) if existing.public_key == *public_key.as_bytes() => {
                    Ok((existing.salt.clone(), false))
                }
                Some(_) => Err(CofferError::auth(AuthFailureReason::PublicKeyMismatch)),
                None => {
                    let salt = Salt::random(self.salt_len);
                    tenant.set_registration(Registration {
                        public_key: *public_key.as_bytes(),
                        salt: salt.clone(),
                    });
                    Ok((salt, true))
                }
            }
        })?;

        let host = self.placement.host_for(&tenant_id).to_string();
        if created {
            self.stats.signups.fetch_add(1, Ordering::Relaxed);
            info!(tenant_id = %tenant_id, host = %host, "tenant registered");
        }
        Ok(SignupReceipt {
            tenant_id,
            public_key: *public_key,
            host,
            salt,
        })
    }

    /// The salt the tenant's next request must be signed with.
    pub fn current_salt(&self, tenant_id: &str) -> CofferResult<Salt> {
        self.store
            .with_tenant(tenant_id, |tenant| {
                tenant
                    .registration()
                    .map(|r| r.salt.clone())
                    .ok_or_else(|| CofferError::auth(AuthFailureReason::NotRegistered))
            })
            .map_err(unknown_tenant)
    }

    /// Verify a decoded request and rotate the tenant's salt on success.
    pub fn verify(
        &self,
        tenant_id: &str,
        public_key: &PublicKey,
        salt: &Salt,
        signature: &[u8; SIGNATURE_LEN],
        body: &Value,
    ) -> CofferResult<Verified> {
        let result = self.verify_inner(tenant_id, public_key, salt, signature, body);
        match &result {
            Ok(_) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                debug!(tenant_id = %tenant_id, "request verified");
            }
            Err(err) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(tenant_id = %tenant_id, error = %err, "request rejected");
            }
        }
        result
    }

    fn verify_inner(
        &self,
        tenant_id: &str,
        public_key: &PublicKey,
        salt: &Salt,
        signature: &[u8; SIGNATURE_LEN],
        body: &Value,
    ) -> CofferResult<Verified> {
        // The signature depends only on the request, so it is checked before
        // the tenant lock is taken.
        let message = signed_message(body, salt.as_bytes());
        public_key.verify(&message, signature)?;

        self.store
            .with_tenant(tenant_id, |tenant| {
                let registration = tenant
                    .registration_mut()
                    .ok_or_else(|| CofferError::auth(AuthFailureReason::NotRegistered))?;
                if registration.public_key != *public_key.as_bytes() {
                    return Err(CofferError::auth(AuthFailureReason::PublicKeyMismatch));
                }
                if registration.salt != *salt {
                    return Err(CofferError::auth(AuthFailureReason::StaleSalt));
                }
                let next_salt = Salt::random(self.salt_len);
                registration.salt = next_salt.clone();
                Ok(Verified {
                    tenant_id: tenant_id.to_string(),
                    next_salt,
                })
            })
            .map_err(unknown_tenant)
    }

    /// Verify a signed envelope. The tenant id is the envelope's public key.
    pub fn verify_request(&self, request: &SignedRequest) -> CofferResult<Verified> {
        let decoded = match request.decode() {
            Ok(decoded) => decoded,
            Err(err) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "malformed request envelope");
                return Err(err);
            }
        };
        let tenant_id = decoded.public_key.to_hex();
        self.verify(
            &tenant_id,
            &decoded.public_key,
            &decoded.salt,
            &decoded.signature,
            &request.body,
        )
    }

    /// Current counters.
    pub fn stats(&self) -> AuthStatsSnapshot {
        AuthStatsSnapshot {
            signups: self.stats.signups.load(Ordering::Relaxed),
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
        }
    }
}

fn unknown_tenant(err: CofferError) -> CofferError {
    match err {
        CofferError::TenantNotFound { .. } => CofferError::auth(AuthFailureReason::UnknownTenant),
        other => other,
    }
}
