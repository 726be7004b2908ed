//! Startup sanitation for the session store.
//!
//! A storage-layer bug in earlier builds could poison an entry by writing
//! the entry's own key name into its value, leaving documents like
//! `appKey = ["appKey"]` behind. A corrupt entry blocks every later login,
//! so sanitation runs before the first read: recognized patterns are
//! deleted outright and the caller proceeds as if the entry never existed.
//! No attempt is made to reconstruct a partial value.

use tracing::{info, warn};

use crate::keys::StorageKeys;
use crate::traits::SessionStorage;
use crate::StorageResult;

/// Checks one entry against the known corruption patterns and deletes it
/// if any matches. Returns `true` if the entry was removed.
pub fn sanitize(storage: &dyn SessionStorage, key: &str) -> StorageResult<bool> {
    let value = match storage.get(key)? {
        Some(value) => value,
        None => return Ok(false),
    };
    match corruption_pattern(key, &value) {
        Some(pattern) => {
            warn!(key, pattern, "Removing corrupt storage entry");
            storage.delete(key)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Sanitizes every fixed key and sweeps stale per-attempt records.
///
/// Runs once at process start, before anything reads the store. Attempt
/// records that survived to this point belong to attempts that can no
/// longer complete. Returns the number of entries removed.
pub fn sanitize_at_startup(storage: &dyn SessionStorage) -> StorageResult<usize> {
    let mut removed = 0;
    for key in [StorageKeys::APP_KEY, StorageKeys::PUBLIC_KEY] {
        if sanitize(storage, key)? {
            removed += 1;
        }
    }
    for key in storage.list_keys_with_prefix(StorageKeys::PROVIDER_SESSION_PREFIX)? {
        if storage.delete(&key)? {
            removed += 1;
        }
    }
    if removed > 0 {
        info!(removed, "Storage sanitation removed entries");
    }
    Ok(removed)
}

/// Names the corruption pattern a value matches, if any.
///
/// A value is only treated as corrupt when it decodes as JSON and matches
/// a known poisoned shape; anything else is left for the reader to judge,
/// since deleting here is unrecoverable.
fn corruption_pattern(key: &str, value: &str) -> Option<&'static str> {
    let parsed: serde_json::Value = serde_json::from_str(value).ok()?;
    let list = parsed.as_array()?;
    if list.is_empty() {
        // No entry legitimately stores an empty list.
        return Some("empty-list");
    }
    if list.iter().any(|element| element.as_str() == Some(key)) {
        return Some("self-referential-list");
    }
    None
}
