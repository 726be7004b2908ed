//! Account identity derived from the public key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain separator for account id derivation. Changing it changes every
/// derived id, so it is fixed for the life of the format.
const ACCOUNT_HASH_PREFIX: &[u8] = b"latchkey.account.v1:";

/// A stable account reference derived from the held public key.
///
/// The same key always derives the same account, so logging out and back
/// in on one device resolves to the same account without consulting the
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
}

impl Account {
    /// Derives the account for a base64 public key encoding.
    pub fn derive(public_key_encoding: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(ACCOUNT_HASH_PREFIX);
        hasher.update(public_key_encoding.as_bytes());
        let digest = hasher.finalize();
        Self {
            id: format!("acct_{}", URL_SAFE_NO_PAD.encode(&digest[..16])),
        }
    }
}
