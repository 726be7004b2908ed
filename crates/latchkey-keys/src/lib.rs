//! Key material and delegated identity.
//!
//! The device holds a long-lived Ed25519 key pair persisted through
//! [`latchkey_storage`]. A login hands the public half to the identity
//! provider and comes back with a [`DelegationChain`] vouching for it;
//! the pair of held key plus verified chain is a [`SessionIdentity`].
//!
//! [`KeyMaterial`] owns the persistence rules: reuse a valid persisted
//! pair, generate on first use, and regenerate when the persisted material
//! does not decode. Corruption never surfaces to callers.

mod account;
mod delegation;
mod identity;
mod material;

pub use account::Account;
pub use delegation::{Delegation, DelegationChain, SignedDelegation};
pub use identity::SessionIdentity;
pub use material::KeyMaterial;

use latchkey_storage::StorageError;
use thiserror::Error;

/// Errors from key material and delegation handling.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Backing key-value store cannot be read or written
    #[error("Key storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// Delegation chain failed verification against the held key
    #[error("Invalid delegation: {0}")]
    InvalidDelegation(String),

    /// Persisted key material failed to decode
    #[error("Corrupted key material: {0}")]
    CorruptedKeyMaterial(String),

    /// Serialization of key material failed
    #[error("Key encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type KeyResult<T> = Result<T, KeyError>;
