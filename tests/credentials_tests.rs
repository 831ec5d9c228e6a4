//! Tests for the credential guard: verification, rusty detection, rotation
//! and initial pair issuance against an in-memory store.

use std::sync::Arc;

use hawker::credentials::{AuthGuard, AuthOutcome};

mod common;
use common::{basic_header, MemoryStore};

fn guard_with_user() -> (Arc<MemoryStore>, AuthGuard, hawker::credentials::UserRecord) {
    let store = Arc::new(MemoryStore::new());
    let user = store.insert_user("user-1", "demo", "hunter2");
    let guard = AuthGuard::new(store.clone());
    (store, guard, user)
}

#[test]
fn test_correct_pair_authenticates_and_rusty_unchanged() {
    let (store, guard, user) = guard_with_user();

    let outcome = guard.authenticate(&user.credential.key, &user.credential.secret);
    match outcome {
        AuthOutcome::Authenticated(authed) => assert_eq!(authed.id, "user-1"),
        AuthOutcome::Rejected => panic!("expected authentication"),
    }
    assert!(!store.stored("user-1").unwrap().credential.rusty);
}

#[test]
fn test_wrong_secret_rejects_and_marks_rusty() {
    let (store, guard, user) = guard_with_user();

    let outcome = guard.authenticate(&user.credential.key, "wrong-secret");
    assert!(!outcome.is_authenticated());
    assert!(store.stored("user-1").unwrap().credential.rusty);
}

#[test]
fn test_unknown_key_rejects_without_store_mutation() {
    let (store, guard, _user) = guard_with_user();

    let outcome = guard.authenticate("no-such-key", "whatever");
    assert!(!outcome.is_authenticated());
    assert!(!store.stored("user-1").unwrap().credential.rusty);
}

#[test]
fn test_rusty_credential_still_authenticates_with_correct_secret() {
    let (store, guard, user) = guard_with_user();

    assert!(!guard
        .authenticate(&user.credential.key, "wrong-secret")
        .is_authenticated());
    assert!(store.stored("user-1").unwrap().credential.rusty);

    // Detection only gates the mismatch path, not valid use.
    let outcome = guard.authenticate(&user.credential.key, &user.credential.secret);
    match outcome {
        AuthOutcome::Authenticated(authed) => assert!(authed.credential.rusty),
        AuthOutcome::Rejected => panic!("rusty credential must still authenticate once"),
    }
}

#[test]
fn test_failed_rusty_persist_is_swallowed() {
    let (store, guard, user) = guard_with_user();
    store.fail_saves(true);

    let outcome = guard.authenticate(&user.credential.key, "wrong-secret");
    assert!(!outcome.is_authenticated());
    // The defensive write failed, so the stored record is untouched.
    assert!(!store.stored("user-1").unwrap().credential.rusty);
}

#[test]
fn test_store_lookup_failure_rejects() {
    let (store, guard, user) = guard_with_user();
    store.fail_lookups(true);

    assert!(!guard
        .authenticate(&user.credential.key, &user.credential.secret)
        .is_authenticated());
}

#[test]
fn test_rotation_replaces_pair_and_invalidates_old_secret() {
    let (store, guard, user) = guard_with_user();
    let old = user.credential.clone();

    let mut current = match guard.authenticate(&old.key, &old.secret) {
        AuthOutcome::Authenticated(user) => user,
        AuthOutcome::Rejected => panic!("expected authentication"),
    };
    let fresh = guard.rotate(&mut current).expect("rotation persists");

    assert_ne!(fresh.key, old.key);
    assert_ne!(fresh.secret, old.secret);
    assert!(!fresh.rusty);

    // The old pair is dead, the new one lives.
    assert!(!guard.authenticate(&old.key, &old.secret).is_authenticated());
    assert!(guard.authenticate(&fresh.key, &fresh.secret).is_authenticated());
    assert_eq!(store.stored("user-1").unwrap().credential.key, fresh.key);
}

#[test]
fn test_rotation_clears_rusty_flag() {
    let (store, guard, user) = guard_with_user();

    assert!(!guard
        .authenticate(&user.credential.key, "wrong-secret")
        .is_authenticated());

    let mut current = match guard.authenticate(&user.credential.key, &user.credential.secret) {
        AuthOutcome::Authenticated(user) => user,
        AuthOutcome::Rejected => panic!("expected authentication"),
    };
    assert!(current.credential.rusty);

    guard.rotate(&mut current).expect("rotation persists");
    assert!(!store.stored("user-1").unwrap().credential.rusty);
}

#[test]
fn test_rotation_persist_failure_surfaces_to_caller() {
    let (store, guard, user) = guard_with_user();
    let mut current = user.clone();
    store.fail_saves(true);

    assert!(guard.rotate(&mut current).is_err());
    // The stored record still carries the original pair.
    assert_eq!(
        store.stored("user-1").unwrap().credential.key,
        user.credential.key
    );
}

#[test]
fn test_issue_pair_for_known_identity() {
    let (store, guard, user) = guard_with_user();

    let issued = guard
        .issue_pair("demo", "hunter2")
        .expect("store reachable")
        .expect("identity known");
    assert_ne!(issued.key, user.credential.key);
    assert_eq!(store.stored("user-1").unwrap().credential.key, issued.key);
}

#[test]
fn test_issue_pair_for_unknown_identity() {
    let (_store, guard, _user) = guard_with_user();
    assert!(guard
        .issue_pair("nobody", "nothing")
        .expect("store reachable")
        .is_none());
}

#[test]
fn test_verify_basic_wire_format() {
    let (_store, guard, user) = guard_with_user();

    let header = basic_header(&user.credential.key, &user.credential.secret);
    assert!(guard.verify_basic(&header).is_authenticated());

    assert!(!guard.verify_basic("Basic not-base64!!").is_authenticated());
    assert!(!guard.verify_basic("Bearer whatever").is_authenticated());
    assert!(!guard.verify_basic("").is_authenticated());
}
