//! Authentication error types.

use latchkey_keys::KeyError;
use latchkey_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the login engine.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Persistent key-value store cannot be read or written
    #[error("Key storage unavailable: {0}")]
    KeyStorageUnavailable(StorageError),

    /// Provider delegation failed verification or redemption
    #[error("Invalid delegation: {0}")]
    InvalidDelegation(String),

    /// No usable way to present a login in this runtime
    #[error("No usable login transport for this runtime")]
    TransportUnavailable,

    /// Presenting the session URL failed
    #[error("Presentation failed: {0}")]
    Presentation(String),

    /// Completion window elapsed without a terminal signal
    #[error("Login attempt timed out")]
    Timeout,

    /// The user abandoned the attempt. Not a failure; the engine returns
    /// to the unauthenticated state without recording an error.
    #[error("Login attempt cancelled")]
    Cancelled,

    /// Provider endpoint returned an unusable response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Invalid transition in the session state machine
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// Whether retrying the same operation can plausibly succeed without
    /// the user changing anything.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Timeout => true,
            AuthError::KeyStorageUnavailable(_) => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::KeyStorageUnavailable(e)
    }
}

impl From<KeyError> for AuthError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::StorageUnavailable(inner) => AuthError::KeyStorageUnavailable(inner),
            KeyError::InvalidDelegation(reason) => AuthError::InvalidDelegation(reason),
            // Key material handling replaces corrupt material itself; if a
            // corruption error still escapes, the store is the culprit.
            KeyError::CorruptedKeyMaterial(reason) => {
                AuthError::KeyStorageUnavailable(StorageError::Encoding(reason))
            }
            KeyError::Encoding(inner) => AuthError::Json(inner),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AuthError::Timeout.to_string(),
            "Login attempt timed out"
        );
        assert_eq!(
            AuthError::Cancelled.to_string(),
            "Login attempt cancelled"
        );
        assert_eq!(
            AuthError::TransportUnavailable.to_string(),
            "No usable login transport for this runtime"
        );
        assert_eq!(
            AuthError::InvalidDelegation("bad chain".to_string()).to_string(),
            "Invalid delegation: bad chain"
        );
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(AuthError::Timeout.is_retryable());
    }

    #[test]
    fn test_storage_unavailable_is_retryable() {
        let err = AuthError::KeyStorageUnavailable(StorageError::Unavailable(
            "locked".to_string(),
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!AuthError::Cancelled.is_retryable());
        assert!(!AuthError::TransportUnavailable.is_retryable());
        assert!(!AuthError::InvalidDelegation("bad".to_string()).is_retryable());
        assert!(!AuthError::Config("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_key_error_mapping() {
        let err: AuthError = KeyError::InvalidDelegation("expired".to_string()).into();
        assert!(matches!(err, AuthError::InvalidDelegation(_)));

        let err: AuthError =
            KeyError::StorageUnavailable(StorageError::Unavailable("locked".to_string())).into();
        assert!(matches!(err, AuthError::KeyStorageUnavailable(_)));

        let err: AuthError = KeyError::CorruptedKeyMaterial("garbage".to_string()).into();
        assert!(matches!(err, AuthError::KeyStorageUnavailable(_)));
    }
}
