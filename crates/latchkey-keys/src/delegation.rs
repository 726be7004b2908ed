//! Delegation chain types and verification.
//!
//! A chain vouches for a holder key when its leaf audience is that key and
//! each link is issued by the previous link's audience. Verification checks
//! signatures, ordering, and expiry; root trust is the caller's policy.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{KeyError, KeyResult};

/// One link of delegated authority: the issuer vouches that the audience
/// key may act under the given scope until expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Base64 Ed25519 public key of the issuing party.
    pub issuer: String,
    /// Base64 Ed25519 public key the authority is delegated to.
    pub audience: String,
    /// Capability granted by this link.
    pub scope: String,
    /// Moment this link stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Delegation {
    /// Canonical byte encoding covered by the issuer signature.
    pub fn signing_bytes(&self) -> KeyResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A delegation together with the issuer's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDelegation {
    pub delegation: Delegation,
    /// Base64 issuer signature over [`Delegation::signing_bytes`].
    pub signature: String,
}

impl SignedDelegation {
    /// Signs a delegation with the issuer's key.
    pub fn issue(issuer: &SigningKey, delegation: Delegation) -> KeyResult<Self> {
        let bytes = delegation.signing_bytes()?;
        let signature = BASE64.encode(issuer.sign(&bytes).to_bytes());
        Ok(Self {
            delegation,
            signature,
        })
    }

    fn verify(&self) -> KeyResult<()> {
        let issuer = decode_verifying_key(&self.delegation.issuer)?;
        let raw = BASE64.decode(&self.signature).map_err(|e| {
            KeyError::InvalidDelegation(format!("Signature is not valid base64: {}", e))
        })?;
        let signature = Signature::from_slice(&raw)
            .map_err(|e| KeyError::InvalidDelegation(format!("Malformed signature: {}", e)))?;
        let bytes = self.delegation.signing_bytes()?;
        issuer.verify_strict(&bytes, &signature).map_err(|_| {
            KeyError::InvalidDelegation(format!(
                "Signature check failed for issuer {}",
                self.delegation.issuer
            ))
        })?;
        if self.delegation.expires_at <= Utc::now() {
            return Err(KeyError::InvalidDelegation(format!(
                "Delegation for {} expired at {}",
                self.delegation.audience, self.delegation.expires_at
            )));
        }
        Ok(())
    }
}

/// An ordered chain of signed delegations, root first.
///
/// Each link's audience issues the next link, and the final audience is
/// the key the chain vouches for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationChain {
    pub links: Vec<SignedDelegation>,
}

impl DelegationChain {
    /// A chain with no links. Never verifies; used for identities that
    /// carry no provider delegation.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single-link chain.
    pub fn single(link: SignedDelegation) -> Self {
        Self { links: vec![link] }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Verifies the chain vouches for the given holder key: every link
    /// signature checks out, no link has expired, links hand authority to
    /// each other in order, and the final audience is the holder.
    ///
    /// This checks structure and signatures only; whether the root issuer
    /// is trusted is the caller's policy.
    pub fn verify_for_holder(&self, holder_public_key: &str) -> KeyResult<()> {
        let leaf = self
            .links
            .last()
            .ok_or_else(|| KeyError::InvalidDelegation("Chain has no links".to_string()))?;
        if leaf.delegation.audience != holder_public_key {
            return Err(KeyError::InvalidDelegation(format!(
                "Chain terminates at {} instead of the held key",
                leaf.delegation.audience
            )));
        }
        for window in self.links.windows(2) {
            if window[1].delegation.issuer != window[0].delegation.audience {
                return Err(KeyError::InvalidDelegation(format!(
                    "Broken chain: {} is not issued by the previous audience",
                    window[1].delegation.audience
                )));
            }
        }
        for link in &self.links {
            link.verify()?;
        }
        Ok(())
    }
}

pub(crate) fn decode_verifying_key(encoded: &str) -> KeyResult<VerifyingKey> {
    let raw = BASE64.decode(encoded).map_err(|e| {
        KeyError::InvalidDelegation(format!("Public key is not valid base64: {}", e))
    })?;
    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        KeyError::InvalidDelegation(format!("Public key must be 32 bytes, got {}", raw.len()))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| KeyError::InvalidDelegation(format!("Invalid public key: {}", e)))
}
