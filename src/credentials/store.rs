use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pair::Credential;

/// Failure reported by a [`CredentialStore`] implementation.
///
/// The dispatch core never retries a failed store operation; whether a
/// failure changes the request outcome depends on the call site (lookup
/// failures reject, defensive writes are swallowed).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("credential store failure: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A user record as exposed by the external store.
///
/// `username` and `password` are the stable identity fields; they seed the
/// digest when a replacement pair is generated during rotation. The record
/// itself is owned by the store — this crate only ever mutates the
/// `credential` sub-object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub password: String,
    pub credential: Credential,
}

/// Read/write contract the external user-record store must satisfy.
///
/// Request authentication looks records up by credential key only; the
/// username/password lookup exists for initial pair issuance. Implementations
/// are free to block — under the coroutine runtime that stalls only the
/// calling coroutine.
pub trait CredentialStore: Send + Sync {
    /// Look up the user owning the given credential key.
    fn find_by_key(&self, key: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Look up a user by its stable identity fields.
    fn find_by_identity(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Persist the record, replacing any stored state for the same id.
    fn save(&self, user: &UserRecord) -> Result<(), StoreError>;
}
