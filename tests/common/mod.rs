#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use hawker::credentials::{generate_pair, CredentialStore, StoreError, UserRecord};

/// Ensures the may runtime and test tracing are configured only once per
/// test binary.
pub fn init_runtime() {
    static MAY_INIT: std::sync::Once = std::sync::Once::new();
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory credential store with togglable write failures, so persistence
/// degradation paths are exercisable without a real backend.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    fail_saves: AtomicBool,
    fail_lookups: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a user with a freshly generated credential and return the
    /// stored record.
    pub fn insert_user(&self, id: &str, username: &str, password: &str) -> UserRecord {
        let user = UserRecord {
            id: id.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            credential: generate_pair(&format!("{username}:{password}")),
        };
        self.guarded().insert(user.id.clone(), user.clone());
        user
    }

    /// Make every subsequent `save` fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent lookup fail.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Read a stored record back, bypassing failure toggles.
    pub fn stored(&self, id: &str) -> Option<UserRecord> {
        self.guarded().get(id).cloned()
    }

    fn guarded(&self) -> MutexGuard<'_, HashMap<String, UserRecord>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryStore {
    fn find_by_key(&self, key: &str) -> Result<Option<UserRecord>, StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::new("lookup unavailable"));
        }
        Ok(self
            .guarded()
            .values()
            .find(|u| u.credential.key == key)
            .cloned())
    }

    fn find_by_identity(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::new("lookup unavailable"));
        }
        Ok(self
            .guarded()
            .values()
            .find(|u| u.username == username && u.password == password)
            .cloned())
    }

    fn save(&self, user: &UserRecord) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::new("save unavailable"));
        }
        self.guarded().insert(user.id.clone(), user.clone());
        Ok(())
    }
}

/// Render a key/secret pair as an HTTP Basic Authorization header value.
pub fn basic_header(key: &str, secret: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{key}:{secret}")))
}
