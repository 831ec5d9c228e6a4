use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::pair::{generate_pair, Credential};
use super::store::{CredentialStore, StoreError, UserRecord};

/// Outcome of verifying a presented key/secret pair.
///
/// Rejection is deliberately featureless: an unknown key, a wrong secret and
/// a store lookup failure all collapse into [`AuthOutcome::Rejected`], so a
/// caller probing the keyspace learns nothing from the response.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The pair matched; the owning user record is returned.
    Authenticated(UserRecord),
    /// The pair did not match, or the key is unknown.
    Rejected,
}

impl AuthOutcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }
}

/// Verifies inbound credentials and runs the rotation flow.
///
/// An explicit instance parameterized by an injected [`CredentialStore`];
/// construct one per service. The guard owns a map of per-user-identity
/// locks so the two credential mutation points (rusty marking and rotation)
/// serialize per user while cross-user traffic stays uncontended.
pub struct AuthGuard {
    store: Arc<dyn CredentialStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AuthGuard {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Verify a presented key/secret pair.
    ///
    /// Looks the user up by key only. A matching secret authenticates even
    /// when the credential is already rusty; detection gates the mismatch
    /// path, not valid use. On a mismatch the credential is flagged
    /// `rusty = true` and persisted before rejecting - a failed flag write is
    /// swallowed (logged for operators) so it cannot alter the rejection or
    /// leak state to the caller.
    pub fn authenticate(&self, presented_key: &str, presented_secret: &str) -> AuthOutcome {
        let user = match self.store.find_by_key(presented_key) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("authentication rejected: unknown key");
                return AuthOutcome::Rejected;
            }
            Err(err) => {
                warn!(error = %err, "credential lookup failed, rejecting");
                return AuthOutcome::Rejected;
            }
        };

        if user.credential.secret == presented_secret {
            debug!(user_id = %user.id, rusty = user.credential.rusty, "authenticated");
            return AuthOutcome::Authenticated(user);
        }

        // Wrong secret against a known key: someone (owner or attacker) is
        // probing this key. Flag it before rejecting.
        self.mark_rusty(user);
        AuthOutcome::Rejected
    }

    /// Verify an HTTP Basic Authentication header value.
    ///
    /// The wire format puts the key in the username field and the secret in
    /// the password field. Anything that fails to decode rejects.
    pub fn verify_basic(&self, header_value: &str) -> AuthOutcome {
        let encoded = match strip_basic_prefix(header_value) {
            Some(rest) => rest,
            None => return AuthOutcome::Rejected,
        };
        let decoded = match BASE64.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return AuthOutcome::Rejected,
        };
        let decoded = match String::from_utf8(decoded) {
            Ok(s) => s,
            Err(_) => return AuthOutcome::Rejected,
        };
        match decoded.split_once(':') {
            Some((key, secret)) => self.authenticate(key, secret),
            None => AuthOutcome::Rejected,
        }
    }

    /// Replace the user's credential with a freshly generated pair.
    ///
    /// The new pair is seeded from the user's stable identity fields, the
    /// `rusty` flag is cleared, and the record is persisted under the
    /// per-identity lock. Returns the new credential so the caller can attach
    /// it to the response; on a persist failure the caller degrades silently
    /// and the request proceeds on the old credential.
    pub fn rotate(&self, user: &mut UserRecord) -> Result<Credential, StoreError> {
        let lock = self.identity_lock(&user.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let fresh = generate_pair(&format!("{}:{}", user.username, user.password));
        user.credential = fresh.clone();
        self.store.save(user)?;
        info!(user_id = %user.id, "credential rotated");
        Ok(fresh)
    }

    /// Issue the initial pair for a user identified by username/password.
    ///
    /// Returns `Ok(None)` when no such user exists. This is the only lookup
    /// that uses the identity fields; request authentication always goes by
    /// key.
    pub fn issue_pair(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let mut user = match self.store.find_by_identity(username, password)? {
            Some(user) => user,
            None => return Ok(None),
        };
        let fresh = generate_pair(&format!("{}:{}", user.username, user.password));
        user.credential = fresh.clone();
        self.store.save(&user)?;
        info!(user_id = %user.id, "credential pair issued");
        Ok(Some(fresh))
    }

    /// Flag the credential as possibly compromised and persist, swallowing
    /// persistence errors.
    fn mark_rusty(&self, mut user: UserRecord) {
        let lock = self.identity_lock(&user.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        user.credential.rusty = true;
        match self.store.save(&user) {
            Ok(()) => {
                info!(user_id = %user.id, "secret mismatch, credential marked rusty");
            }
            Err(err) => {
                warn!(
                    user_id = %user.id,
                    error = %err,
                    "failed to persist rusty flag, rejection unaffected"
                );
            }
        }
    }

    fn identity_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Whether a raw request body asks for rotation via the reserved field.
///
/// The check runs on the raw body, before coercion strips the field out.
#[must_use]
pub fn rotation_requested(body: Option<&Value>) -> bool {
    let flag = match body.and_then(|b| b.get(super::ROTATION_FIELD)) {
        Some(v) => v,
        None => return false,
    };
    match flag {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn strip_basic_prefix(header_value: &str) -> Option<&str> {
    let trimmed = header_value.trim_start();
    let bytes = trimmed.as_bytes();
    if bytes.len() < 6 || !bytes[..6].eq_ignore_ascii_case(b"basic ") {
        return None;
    }
    // The first six bytes are ASCII, so the split is on a char boundary.
    Some(&trimmed[6..])
}
