//! Signed-request authentication tests.

mod common;

use coffer::auth::envelope::SignedRequest;
use coffer::auth::keys::Keypair;
use coffer::auth::salt::Salt;
use coffer::auth::session::AuthSessionManager;
use coffer::control::placement::HostPlacement;
use coffer::core::error::{AuthFailureReason, ErrorKind};
use serde_json::json;

fn reason(err: coffer::core::error::CofferError) -> Option<AuthFailureReason> {
    err.auth_reason()
}

// ============================================================================
// Signup
// ============================================================================

#[test]
fn signup_registers_tenant_keyed_by_public_key() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store.clone());

    let receipt = auth.signup("correct horse").unwrap();
    let keypair = Keypair::derive("correct horse").unwrap();
    assert_eq!(receipt.public_key, keypair.public_key());
    assert_eq!(receipt.tenant_id, keypair.public_key().to_hex());
    assert_eq!(receipt.salt.len(), 32);
    assert_eq!(receipt.host, "127.0.0.1:8091");
    assert!(store.contains_tenant(&receipt.tenant_id));
    assert_eq!(auth.current_salt(&receipt.tenant_id).unwrap(), receipt.salt);
}

#[test]
fn repeated_signup_is_idempotent() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store.clone());
    let first = auth.signup("pw").unwrap();
    let second = auth.signup("pw").unwrap();
    assert_eq!(first.tenant_id, second.tenant_id);
    assert_eq!(first.salt, second.salt);
    assert_eq!(store.tenant_count(), 1);
    assert_eq!(auth.stats().signups, 1);
}

#[test]
fn signup_respects_tenant_ceiling() {
    let (store, _) = common::create_store_with_ceiling(1);
    let auth = common::create_auth(store);
    auth.signup("one").unwrap();
    let err = auth.signup("two").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManyTenants);
}

#[test]
fn placement_is_stable_per_tenant() {
    let (store, _) = common::create_store();
    let hosts = vec!["h1:1".to_string(), "h2:1".to_string(), "h3:1".to_string()];
    let auth = AuthSessionManager::new(store, HostPlacement::new(hosts.clone(), 7).unwrap(), 32);
    let a = auth.signup("alpha").unwrap();
    let again = auth.signup("alpha").unwrap();
    assert_eq!(a.host, again.host);
    assert!(hosts.contains(&a.host));
}

#[test]
fn current_salt_for_unregistered_tenant() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store.clone());
    store.ping("plain").unwrap();
    assert_eq!(
        reason(auth.current_salt("plain").unwrap_err()),
        Some(AuthFailureReason::NotRegistered)
    );
    assert_eq!(
        reason(auth.current_salt("ghost").unwrap_err()),
        Some(AuthFailureReason::UnknownTenant)
    );
}

// ============================================================================
// Verification
// ============================================================================

#[test]
fn verify_accepts_and_rotates_salt() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let receipt = auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();

    let body = json!({"op": "set", "key": "k", "value": 1});
    let request = SignedRequest::sign(&keypair, &receipt.salt, body);
    let verified = auth.verify_request(&request).unwrap();

    assert_eq!(verified.tenant_id, receipt.tenant_id);
    assert_ne!(verified.next_salt, receipt.salt);
    assert_eq!(auth.current_salt(&receipt.tenant_id).unwrap(), verified.next_salt);
}

#[test]
fn replayed_request_is_stale() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let receipt = auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();

    let request = SignedRequest::sign(&keypair, &receipt.salt, json!({"op": "ping"}));
    auth.verify_request(&request).unwrap();
    let err = auth.verify_request(&request).unwrap_err();
    assert_eq!(reason(err), Some(AuthFailureReason::StaleSalt));
}

#[test]
fn chained_requests_use_each_issued_salt() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let receipt = auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();

    let mut salt = receipt.salt;
    for i in 0..5 {
        let request = SignedRequest::sign(&keypair, &salt, json!({"seq": i}));
        salt = auth.verify_request(&request).unwrap().next_salt;
    }
    assert_eq!(auth.stats().accepted, 5);
}

#[test]
fn tampered_body_fails_signature() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let receipt = auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();

    let mut request = SignedRequest::sign(&keypair, &receipt.salt, json!({"amount": 1}));
    request.body = json!({"amount": 1000});
    let err = auth.verify_request(&request).unwrap_err();
    assert_eq!(reason(err), Some(AuthFailureReason::BadSignature));

    // A failed attempt does not consume the salt.
    assert_eq!(auth.current_salt(&receipt.tenant_id).unwrap(), receipt.salt);
}

#[test]
fn key_order_in_body_does_not_matter() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let receipt = auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();

    let mut request = SignedRequest::sign(&keypair, &receipt.salt, json!({"a": 1, "b": 2}));
    request.body = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
    auth.verify_request(&request).unwrap();
}

#[test]
fn wrong_salt_is_stale() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();

    let request = SignedRequest::sign(&keypair, &Salt::random(32), json!({}));
    let err = auth.verify_request(&request).unwrap_err();
    assert_eq!(reason(err), Some(AuthFailureReason::StaleSalt));
}

#[test]
fn unregistered_key_is_unknown_tenant() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let keypair = Keypair::generate();
    let request = SignedRequest::sign(&keypair, &Salt::random(32), json!({}));
    let err = auth.verify_request(&request).unwrap_err();
    assert_eq!(reason(err), Some(AuthFailureReason::UnknownTenant));
}

#[test]
fn foreign_key_against_tenant_is_mismatch() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let alice = auth.signup("alice").unwrap();
    let mallory = Keypair::derive("mallory").unwrap();

    let body = json!({"op": "get"});
    let signature = coffer::auth::envelope::sign_request(&mallory, &body, &alice.salt);
    let err = auth
        .verify(
            &alice.tenant_id,
            &mallory.public_key(),
            &alice.salt,
            &signature,
            &body,
        )
        .unwrap_err();
    assert_eq!(reason(err), Some(AuthFailureReason::PublicKeyMismatch));
}

#[test]
fn malformed_envelope_rejected() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let request = SignedRequest {
        public_key: "zz".to_string(),
        salt: "00".to_string(),
        signature: "00".to_string(),
        body: json!({}),
    };
    let err = auth.verify_request(&request).unwrap_err();
    assert_eq!(reason(err), Some(AuthFailureReason::MalformedEnvelope));
    assert_eq!(auth.stats().rejected, 1);
}

#[test]
fn envelope_survives_json_transport() {
    let (store, _) = common::create_store();
    let auth = common::create_auth(store);
    let receipt = auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();

    let text = SignedRequest::sign(&keypair, &receipt.salt, json!({"x": [1, 2.5, null]}))
        .to_json()
        .unwrap();
    let request = SignedRequest::from_json(&text).unwrap();
    auth.verify_request(&request).unwrap();
}

#[test]
fn concurrent_replays_accept_exactly_once() {
    let (store, _) = common::create_store();
    let auth = std::sync::Arc::new(common::create_auth(store));
    let receipt = auth.signup("pw").unwrap();
    let keypair = Keypair::derive("pw").unwrap();
    let request = SignedRequest::sign(&keypair, &receipt.salt, json!({"op": "ping"}));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let auth = auth.clone();
            let request = request.clone();
            std::thread::spawn(move || auth.verify_request(&request).is_ok())
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(accepted, 1);
}
