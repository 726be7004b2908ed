//! Key material lifecycle.
//!
//! `KeyMaterial` owns the stored key pair. A valid record is reused; a
//! record that fails to decode is discarded and a fresh pair generated in
//! its place. The public half stays cached for URL construction.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use latchkey_storage::{SessionStorage, StorageKeys};

use crate::delegation::DelegationChain;
use crate::identity::SessionIdentity;
use crate::{KeyError, KeyResult};

/// Owns the persisted Ed25519 key pair.
///
/// The pair is stored as a JSON array `[public_b64, private_b64]` under
/// [`StorageKeys::APP_KEY`], with the public half cached separately under
/// [`StorageKeys::PUBLIC_KEY`]. Material that fails to decode is replaced
/// with a fresh pair; callers never see a corruption error from
/// [`KeyMaterial::ensure_key_pair`].
pub struct KeyMaterial {
    storage: Arc<dyn SessionStorage>,
}

impl KeyMaterial {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Returns the base64 public key, generating and persisting a fresh
    /// pair on first use or when the persisted material does not decode.
    ///
    /// Storage failures propagate; they are the one case where no key can
    /// be produced.
    pub fn ensure_key_pair(&self) -> KeyResult<String> {
        match self.load_key_pair() {
            Ok(Some(signing_key)) => {
                let encoding = BASE64.encode(signing_key.verifying_key().to_bytes());
                self.refresh_public_cache(&encoding)?;
                debug!("Reusing persisted session key pair");
                Ok(encoding)
            }
            Ok(None) => self.generate_and_persist(),
            Err(KeyError::CorruptedKeyMaterial(reason)) => {
                warn!(reason, "Replacing undecodable key material");
                self.discard_key_pair()?;
                self.generate_and_persist()
            }
            Err(e) => Err(e),
        }
    }

    /// Binds the persisted key pair to a delegation chain from the
    /// provider, producing the session identity.
    pub fn current_identity(&self, chain: DelegationChain) -> KeyResult<SessionIdentity> {
        match self.load_key_pair() {
            Ok(Some(signing_key)) => SessionIdentity::new(signing_key, chain),
            Ok(None) => Err(KeyError::InvalidDelegation(
                "No persisted key pair to bind the delegation to".to_string(),
            )),
            Err(KeyError::CorruptedKeyMaterial(reason)) => {
                // The delegation was granted to a key we can no longer
                // decode; discard it and make the caller log in again.
                warn!(reason, "Discarding undecodable key material");
                self.discard_key_pair()?;
                Err(KeyError::InvalidDelegation(
                    "Held key material was replaced; delegation no longer applies".to_string(),
                ))
            }
            Err(e) => Err(e),
        }
    }

    fn load_key_pair(&self) -> KeyResult<Option<SigningKey>> {
        let raw = match self.storage.get(StorageKeys::APP_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let tuple: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
            KeyError::CorruptedKeyMaterial(format!("Key pair is not a JSON array: {}", e))
        })?;
        if tuple.len() != 2 {
            return Err(KeyError::CorruptedKeyMaterial(format!(
                "Key pair has {} elements, expected 2",
                tuple.len()
            )));
        }
        let private_raw = BASE64.decode(&tuple[1]).map_err(|e| {
            KeyError::CorruptedKeyMaterial(format!("Private key is not valid base64: {}", e))
        })?;
        let private_bytes: [u8; 32] = private_raw.as_slice().try_into().map_err(|_| {
            KeyError::CorruptedKeyMaterial(format!(
                "Private key is {} bytes, expected 32",
                private_raw.len()
            ))
        })?;
        let signing_key = SigningKey::from_bytes(&private_bytes);
        let derived_public = BASE64.encode(signing_key.verifying_key().to_bytes());
        if derived_public != tuple[0] {
            return Err(KeyError::CorruptedKeyMaterial(
                "Public half does not match the private half".to_string(),
            ));
        }
        Ok(Some(signing_key))
    }

    fn generate_and_persist(&self) -> KeyResult<String> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let encoding = BASE64.encode(signing_key.verifying_key().to_bytes());
        let private = BASE64.encode(signing_key.to_bytes());
        let tuple = serde_json::to_string(&[encoding.as_str(), private.as_str()])?;

        self.storage.set(StorageKeys::APP_KEY, &tuple)?;
        self.storage.set(StorageKeys::PUBLIC_KEY, &encoding)?;
        info!("Generated new session key pair");
        Ok(encoding)
    }

    fn refresh_public_cache(&self, encoding: &str) -> KeyResult<()> {
        let cached = self.storage.get(StorageKeys::PUBLIC_KEY)?;
        if cached.as_deref() != Some(encoding) {
            self.storage.set(StorageKeys::PUBLIC_KEY, encoding)?;
        }
        Ok(())
    }

    fn discard_key_pair(&self) -> KeyResult<()> {
        self.storage.delete(StorageKeys::APP_KEY)?;
        self.storage.delete(StorageKeys::PUBLIC_KEY)?;
        Ok(())
    }
}
