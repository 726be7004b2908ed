//! Storage trait definitions.

use crate::StorageResult;

/// Key-value storage for session state.
///
/// Implementations are safe to share across threads; callers hold them
/// behind an `Arc` and may read and write concurrently.
pub trait SessionStorage: Send + Sync {
    /// Stores a value under the given key, replacing any existing value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieves the value for a key, or `None` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Deletes a key. Returns `true` if the key existed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Checks whether a key exists.
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Lists all keys starting with the given prefix.
    ///
    /// Backends that cannot enumerate keys return an empty list.
    fn list_keys_with_prefix(&self, _prefix: &str) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }
}
