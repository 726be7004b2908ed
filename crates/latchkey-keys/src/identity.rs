//! Session identity combining a signing key with its delegation chain.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signer, SigningKey};

use crate::account::Account;
use crate::delegation::DelegationChain;
use crate::KeyResult;

/// The held key pair bound to a verified delegation chain.
///
/// Constructing one through [`SessionIdentity::new`] proves the chain
/// vouches for the held key; an identity in hand is already verified.
#[derive(Clone)]
pub struct SessionIdentity {
    signing_key: SigningKey,
    chain: DelegationChain,
    account: Account,
}

impl SessionIdentity {
    /// Binds a signing key to a delegation chain, verifying the chain
    /// terminates at this key.
    pub fn new(signing_key: SigningKey, chain: DelegationChain) -> KeyResult<Self> {
        let encoding = BASE64.encode(signing_key.verifying_key().to_bytes());
        chain.verify_for_holder(&encoding)?;
        Ok(Self {
            signing_key,
            chain,
            account: Account::derive(&encoding),
        })
    }

    /// An identity derived from a fixed seed, carrying no delegation.
    ///
    /// The same seed always yields the same key and account. Only the
    /// development path uses this; it never reaches a provider.
    pub fn deterministic(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let encoding = BASE64.encode(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            chain: DelegationChain::empty(),
            account: Account::derive(&encoding),
        }
    }

    /// Base64 encoding of the public key.
    pub fn public_key_encoding(&self) -> String {
        BASE64.encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs a payload with the held key, returning the base64 signature.
    pub fn sign(&self, payload: &[u8]) -> String {
        BASE64.encode(self.signing_key.sign(payload).to_bytes())
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn chain(&self) -> &DelegationChain {
        &self.chain
    }

    /// Whether a provider delegation backs this identity.
    pub fn is_delegated(&self) -> bool {
        !self.chain.is_empty()
    }
}

// Never prints private key material.
impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("public_key", &self.public_key_encoding())
            .field("account", &self.account)
            .field("delegated", &self.is_delegated())
            .finish()
    }
}
