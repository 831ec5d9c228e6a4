//! # Credentials Module
//!
//! Self-healing key/secret credentials for request authentication.
//!
//! ## Overview
//!
//! Every request authenticates with a key/secret pair carried in the HTTP
//! Basic Authentication header (key as username, secret as password). The
//! credential scheme is self-healing:
//!
//! - Lookups happen by **key only**. The first time a wrong secret is
//!   presented against a known key, that credential is flagged as `rusty`
//!   (possibly stolen) and the flag is persisted.
//! - A rusty credential still authenticates once with the correct secret.
//!   That successful request triggers **rotation**: a fresh pair replaces the
//!   old one and is handed to the client in the [`ROTATION_HEADER`] response
//!   header, after which the old secret is dead.
//! - A client can also request rotation explicitly by sending a truthy
//!   [`ROTATION_FIELD`] field in the request body.
//!
//! ## Architecture
//!
//! - [`generate_pair`] - fresh high-entropy pair generation
//! - [`CredentialStore`] - the external persistence contract, injected as
//!   `Arc<dyn CredentialStore>` (no process-wide singleton)
//! - [`AuthGuard`] - verification, rusty detection, and the rotation flow
//!
//! Store failures never change an authentication outcome: defensive writes
//! (rusty marking) are swallowed, and a failed rotation persist only omits
//! the response header for that request.

mod guard;
mod pair;
mod store;

pub use guard::{rotation_requested, AuthGuard, AuthOutcome};
pub use pair::{generate_pair, Credential, KEY_LEN, SECRET_LEN};
pub use store::{CredentialStore, StoreError, UserRecord};

/// Reserved request-body field that requests credential rotation.
///
/// Consumed by the rotation flow, never by handlers: body coercion strips it
/// unconditionally, whatever the route's schema declares.
pub const ROTATION_FIELD: &str = "rusty";

/// Response header carrying the replacement `key:secret` pair after a
/// successful rotation. Absent when rotation did not run or its persist
/// failed.
pub const ROTATION_HEADER: &str = "x-rusty";
