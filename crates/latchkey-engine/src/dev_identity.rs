//! Deterministic development identity.
//!
//! Compiled only for tests or behind the `dev-identity` feature, and
//! still refused at runtime unless the config enables it. The identity is
//! derived from a fixed seed: the same label always yields the same key
//! and account, which is the point. It carries no delegation and works
//! against no provider.

use sha2::{Digest, Sha256};

use latchkey_keys::SessionIdentity;

const DEV_SEED_PREFIX: &[u8] = b"latchkey.dev-identity.v1:";
const DEFAULT_LABEL: &str = "default";

/// The default development identity.
pub fn deterministic_identity() -> SessionIdentity {
    deterministic_identity_labeled(DEFAULT_LABEL)
}

/// A development identity for a specific label, so tests can hold
/// several distinct identities at once.
pub fn deterministic_identity_labeled(label: &str) -> SessionIdentity {
    let mut hasher = Sha256::new();
    hasher.update(DEV_SEED_PREFIX);
    hasher.update(label.as_bytes());
    let seed: [u8; 32] = hasher.finalize().into();
    SessionIdentity::deterministic(&seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = deterministic_identity();
        let b = deterministic_identity();
        assert_eq!(a.public_key_encoding(), b.public_key_encoding());
        assert_eq!(a.account(), b.account());
    }

    #[test]
    fn test_labels_produce_distinct_identities() {
        let a = deterministic_identity_labeled("alice");
        let b = deterministic_identity_labeled("bob");
        assert_ne!(a.public_key_encoding(), b.public_key_encoding());
        assert_ne!(a.account().id, b.account().id);
    }

    #[test]
    fn test_identity_carries_no_delegation() {
        assert!(!deterministic_identity().is_delegated());
    }

    #[test]
    fn test_identity_can_sign() {
        let identity = deterministic_identity();
        assert!(!identity.sign(b"payload").is_empty());
    }
}
