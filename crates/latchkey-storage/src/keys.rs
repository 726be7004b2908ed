//! Storage key constants.

/// Fixed storage keys used by the login flow.
///
/// These names are part of the on-disk format and never change; the repair
/// pass in [`crate::repair`] sanitizes them by name at startup.
pub struct StorageKeys;

impl StorageKeys {
    /// Serialized key pair: a JSON array of `[public_b64, private_b64]`.
    pub const APP_KEY: &'static str = "appKey";

    /// Cached base64 public key, kept consistent with `APP_KEY`.
    pub const PUBLIC_KEY: &'static str = "publicKey";

    /// Prefix for per-attempt bookkeeping records. The attempt id follows
    /// the prefix; records are removed when the attempt resolves.
    pub const PROVIDER_SESSION_PREFIX: &'static str = "provider-session/";

    /// Builds the bookkeeping key for a login attempt.
    pub fn provider_session(attempt_id: &str) -> String {
        format!("{}{}", Self::PROVIDER_SESSION_PREFIX, attempt_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_keys_are_distinct() {
        assert_ne!(StorageKeys::APP_KEY, StorageKeys::PUBLIC_KEY);
        assert!(!StorageKeys::APP_KEY.starts_with(StorageKeys::PROVIDER_SESSION_PREFIX));
        assert!(!StorageKeys::PUBLIC_KEY.starts_with(StorageKeys::PROVIDER_SESSION_PREFIX));
    }

    #[test]
    fn test_provider_session_key() {
        let key = StorageKeys::provider_session("abc-123");
        assert_eq!(key, "provider-session/abc-123");
        assert!(key.starts_with(StorageKeys::PROVIDER_SESSION_PREFIX));
    }
}
