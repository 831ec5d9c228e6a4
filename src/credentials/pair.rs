use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

/// Length of a rendered key digest in hex characters (SHA-256).
pub const KEY_LEN: usize = 64;

/// Length of a rendered secret digest in hex characters (SHA-512).
pub const SECRET_LEN: usize = 128;

/// A key/secret pair identifying a user to the service.
///
/// The `rusty` flag marks a credential as possibly compromised: it is set
/// when a wrong secret is presented against a known key, and cleared when the
/// pair is rotated. A rusty credential still authenticates once with the
/// correct secret, which triggers rotation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub key: String,
    pub secret: String,
    pub rusty: bool,
}

impl Credential {
    /// Render the pair in the `key:secret` wire form used by the rotation
    /// response header.
    #[must_use]
    pub fn wire_pair(&self) -> String {
        format!("{}:{}", self.key, self.secret)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("rusty", &self.rusty)
            .finish()
    }
}

/// Generate a fresh credential pair.
///
/// The key digests the identity hint together with 256 bits of fresh OS
/// entropy, which keeps keys unpredictable and safe from dictionary attacks
/// even for identical hints. The secret digests the key together with a
/// second, independent 512-bit draw under a different algorithm, so knowing
/// a key never narrows down its secret. No entropy is shared between the two
/// derivations.
#[must_use]
pub fn generate_pair(identity_hint: &str) -> Credential {
    let mut entropy = [0u8; 32];
    OsRng.fill_bytes(&mut entropy);
    let mut hasher = Sha256::new();
    hasher.update(identity_hint.as_bytes());
    hasher.update(entropy);
    let key = format!("{:x}", hasher.finalize());

    let mut entropy = [0u8; 64];
    OsRng.fill_bytes(&mut entropy);
    let mut hasher = Sha512::new();
    hasher.update(key.as_bytes());
    hasher.update(b":");
    hasher.update(entropy);
    let secret = format!("{:x}", hasher.finalize());

    Credential {
        key,
        secret,
        rusty: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pair_shape() {
        let pair = generate_pair("user@example.com:hunter2");
        assert_eq!(pair.key.len(), KEY_LEN);
        assert_eq!(pair.secret.len(), SECRET_LEN);
        assert_ne!(pair.key, pair.secret);
        assert!(!pair.rusty);
        assert!(pair.key.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(pair.secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_hint_never_collides() {
        let mut keys = HashSet::new();
        for _ in 0..100_000 {
            let pair = generate_pair("same-hint");
            assert!(keys.insert(pair.key), "duplicate key generated");
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = generate_pair("who");
        let printed = format!("{pair:?}");
        assert!(!printed.contains(&pair.secret));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn test_wire_pair_form() {
        let pair = generate_pair("who");
        assert_eq!(pair.wire_pair(), format!("{}:{}", pair.key, pair.secret));
    }
}
