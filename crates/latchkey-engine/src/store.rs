//! Session state tracking built on the state machine.
//!
//! `SessionStore` holds the machine together with the account, identity,
//! and last error behind one mutex. Status-change callbacks fire after the
//! lock is released.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use latchkey_keys::{Account, SessionIdentity};

use crate::error::{AuthError, AuthResult};
use crate::machine::{SessionMachine, SessionMachineInput, SessionMachineState};

/// User-facing session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Error,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }

    /// Whether the status resolves on its own without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionStatus::Authenticating)
    }
}

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionMachineState::Authenticating => SessionStatus::Authenticating,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
            SessionMachineState::Error => SessionStatus::Error,
        }
    }
}

/// Point-in-time view of the session, safe to hand to any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub status: SessionStatus,
    pub account_id: Option<String>,
    pub error: Option<String>,
}

/// Payload delivered to the status-change callback.
#[derive(Debug, Clone)]
pub struct SessionStatusChangedPayload {
    pub status: SessionStatus,
    pub account_id: Option<String>,
}

pub type SessionStatusCallback = Box<dyn Fn(SessionStatusChangedPayload) + Send + Sync>;

struct Inner {
    machine: SessionMachine,
    account: Option<Account>,
    identity: Option<SessionIdentity>,
    last_error: Option<String>,
}

/// The in-memory session state, guarded by the lifecycle state machine.
///
/// Account and identity are populated in exactly one state: a store
/// observed as `Authenticated` always carries both, and any other status
/// carries neither.
pub struct SessionStore {
    inner: Mutex<Inner>,
    status_callback: Mutex<Option<SessionStatusCallback>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine: SessionMachine::new(),
                account: None,
                identity: None,
                last_error: None,
            }),
            status_callback: Mutex::new(None),
        }
    }

    /// Enters `Authenticating`. Valid from `Unauthenticated` and `Error`;
    /// a retained error from a previous attempt is cleared.
    pub fn begin_authentication(&self) -> AuthResult<SessionStatus> {
        self.apply(&SessionMachineInput::BeginAuthentication, |inner| {
            inner.account = None;
            inner.identity = None;
            inner.last_error = None;
        })
    }

    /// Resolves the running attempt with a verified identity.
    pub fn resolve_success(&self, identity: SessionIdentity) -> AuthResult<SessionStatus> {
        self.apply(&SessionMachineInput::ResolveSuccess, |inner| {
            inner.account = Some(identity.account().clone());
            inner.identity = Some(identity);
            inner.last_error = None;
        })
    }

    /// Resolves the running attempt with a failure; the message is
    /// retained for display until the next attempt.
    pub fn resolve_failure(&self, error: &AuthError) -> AuthResult<SessionStatus> {
        let message = error.to_string();
        self.apply(&SessionMachineInput::ResolveFailure, |inner| {
            inner.last_error = Some(message);
        })
    }

    /// Resolves the running attempt as abandoned by the user. No error is
    /// recorded.
    pub fn cancel(&self) -> AuthResult<SessionStatus> {
        self.apply(&SessionMachineInput::Cancel, |inner| {
            inner.last_error = None;
        })
    }

    /// Clears the session. Works from any state; persisted key material
    /// is not this store's concern and survives.
    pub fn logout(&self) -> SessionStatus {
        let mut inner = self.inner.lock().unwrap();
        let old_status = SessionStatus::from(inner.machine.state());
        let _ = inner.machine.consume(&SessionMachineInput::Logout);
        inner.account = None;
        inner.identity = None;
        inner.last_error = None;
        let new_status = SessionStatus::from(inner.machine.state());
        drop(inner);

        if old_status != new_status {
            debug!(?old_status, ?new_status, "Session status changed");
            self.notify(SessionStatusChangedPayload {
                status: new_status.clone(),
                account_id: None,
            });
        }
        new_status
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from(self.inner.lock().unwrap().machine.state())
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let inner = self.inner.lock().unwrap();
        AuthSnapshot {
            status: SessionStatus::from(inner.machine.state()),
            account_id: inner.account.as_ref().map(|account| account.id.clone()),
            error: inner.last_error.clone(),
        }
    }

    /// The signing identity of the current session, if authenticated.
    pub fn identity(&self) -> Option<SessionIdentity> {
        self.inner.lock().unwrap().identity.clone()
    }

    pub fn account(&self) -> Option<Account> {
        self.inner.lock().unwrap().account.clone()
    }

    /// Registers the status-change callback, replacing any previous one.
    /// Called after every observable status change.
    pub fn set_status_callback(&self, callback: SessionStatusCallback) {
        *self.status_callback.lock().unwrap() = Some(callback);
    }

    fn apply(
        &self,
        input: &SessionMachineInput,
        mutate: impl FnOnce(&mut Inner),
    ) -> AuthResult<SessionStatus> {
        let mut inner = self.inner.lock().unwrap();
        let old_status = SessionStatus::from(inner.machine.state());
        inner.machine.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in status {:?}",
                input, old_status
            ))
        })?;
        mutate(&mut inner);
        let new_status = SessionStatus::from(inner.machine.state());
        let account_id = inner.account.as_ref().map(|account| account.id.clone());
        drop(inner);

        if old_status != new_status {
            debug!(?old_status, ?new_status, "Session status changed");
            self.notify(SessionStatusChangedPayload {
                status: new_status.clone(),
                account_id,
            });
        }
        Ok(new_status)
    }

    fn notify(&self, payload: SessionStatusChangedPayload) {
        let callback = self.status_callback.lock().unwrap();
        if let Some(callback) = callback.as_ref() {
            callback(payload);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_identity() -> SessionIdentity {
        SessionIdentity::deterministic(&[7u8; 32])
    }

    fn store_at_authenticated() -> SessionStore {
        let store = SessionStore::new();
        store.begin_authentication().unwrap();
        store.resolve_success(test_identity()).unwrap();
        store
    }

    #[test]
    fn test_new_store_is_unauthenticated() {
        let store = SessionStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
        assert_eq!(snapshot.account_id, None);
        assert_eq!(snapshot.error, None);
        assert!(store.identity().is_none());
    }

    #[test]
    fn test_begin_enters_authenticating() {
        let store = SessionStore::new();
        let status = store.begin_authentication().unwrap();
        assert_eq!(status, SessionStatus::Authenticating);
        assert!(status.is_transient());
        assert!(!status.is_authenticated());
    }

    #[test]
    fn test_success_stores_account_and_identity() {
        let store = store_at_authenticated();
        let snapshot = store.snapshot();

        assert!(snapshot.status.is_authenticated());
        assert_eq!(snapshot.account_id, Some(test_identity().account().id.clone()));
        assert_eq!(snapshot.error, None);
        assert!(store.identity().is_some());
        assert!(store.account().is_some());
    }

    #[test]
    fn test_failure_retains_message() {
        let store = SessionStore::new();
        store.begin_authentication().unwrap();
        store.resolve_failure(&AuthError::Timeout).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Error);
        assert_eq!(snapshot.error, Some("Login attempt timed out".to_string()));
        assert_eq!(snapshot.account_id, None);
        assert!(store.identity().is_none());
    }

    #[test]
    fn test_retry_clears_retained_error() {
        let store = SessionStore::new();
        store.begin_authentication().unwrap();
        store.resolve_failure(&AuthError::Timeout).unwrap();

        store.begin_authentication().unwrap();
        assert_eq!(store.snapshot().error, None);
    }

    #[test]
    fn test_cancel_leaves_no_error() {
        let store = SessionStore::new();
        store.begin_authentication().unwrap();
        let status = store.cancel().unwrap();

        assert_eq!(status, SessionStatus::Unauthenticated);
        assert_eq!(store.snapshot().error, None);
    }

    #[test]
    fn test_logout_clears_session() {
        let store = store_at_authenticated();
        let status = store.logout();

        assert_eq!(status, SessionStatus::Unauthenticated);
        assert!(store.identity().is_none());
        assert!(store.account().is_none());
        assert_eq!(store.snapshot().account_id, None);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let store = store_at_authenticated();
        assert_eq!(store.logout(), SessionStatus::Unauthenticated);
        assert_eq!(store.logout(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_logout_from_error_state() {
        let store = SessionStore::new();
        store.begin_authentication().unwrap();
        store.resolve_failure(&AuthError::Timeout).unwrap();

        assert_eq!(store.logout(), SessionStatus::Unauthenticated);
        assert_eq!(store.snapshot().error, None);
    }

    #[test]
    fn test_resolve_without_attempt_fails() {
        let store = SessionStore::new();
        let err = store.resolve_success(test_identity()).unwrap_err();
        assert!(matches!(err, AuthError::InvalidStateTransition(_)));
        assert_eq!(store.status(), SessionStatus::Unauthenticated);
        assert!(store.identity().is_none());
    }

    #[test]
    fn test_begin_while_authenticated_fails() {
        let store = store_at_authenticated();
        let err = store.begin_authentication().unwrap_err();
        assert!(matches!(err, AuthError::InvalidStateTransition(_)));
        // The session is untouched.
        assert!(store.status().is_authenticated());
        assert!(store.identity().is_some());
    }

    #[test]
    fn test_only_authenticated_carries_data() {
        let store = SessionStore::new();
        assert!(store.account().is_none() && store.identity().is_none());

        store.begin_authentication().unwrap();
        assert!(store.account().is_none() && store.identity().is_none());

        store.resolve_success(test_identity()).unwrap();
        assert!(store.account().is_some() && store.identity().is_some());

        store.logout();
        assert!(store.account().is_none() && store.identity().is_none());

        store.begin_authentication().unwrap();
        store.resolve_failure(&AuthError::Timeout).unwrap();
        assert!(store.account().is_none() && store.identity().is_none());
    }

    #[test]
    fn test_callback_fires_on_changes() {
        let store = SessionStore::new();
        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = notifications.clone();
        store.set_status_callback(Box::new(move |_payload| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        store.begin_authentication().unwrap();
        store.resolve_success(test_identity()).unwrap();
        store.logout();
        assert_eq!(notifications.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_callback_payload_carries_account() {
        let store = SessionStore::new();
        let last_payload = Arc::new(Mutex::new(None));
        let sink = last_payload.clone();
        store.set_status_callback(Box::new(move |payload| {
            *sink.lock().unwrap() = Some(payload);
        }));

        store.begin_authentication().unwrap();
        store.resolve_success(test_identity()).unwrap();

        let payload = last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(payload.status, SessionStatus::Authenticated);
        assert_eq!(payload.account_id, Some(test_identity().account().id.clone()));
    }

    #[test]
    fn test_callback_skipped_on_failed_transition() {
        let store = SessionStore::new();
        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = notifications.clone();
        store.set_status_callback(Box::new(move |_payload| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let _ = store.resolve_success(test_identity());
        let _ = store.cancel();
        assert_eq!(notifications.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_skipped_on_noop_logout() {
        let store = SessionStore::new();
        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = notifications.clone();
        store.set_status_callback(Box::new(move |_payload| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        store.logout();
        assert_eq!(notifications.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_identity_clone_can_sign() {
        let store = store_at_authenticated();
        let identity = store.identity().unwrap();
        let signature = identity.sign(b"challenge");
        assert!(!signature.is_empty());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::Unauthenticated).unwrap();
        assert_eq!(json, "\"unauthenticated\"");
        let json = serde_json::to_string(&SessionStatus::Authenticating).unwrap();
        assert_eq!(json, "\"authenticating\"");
    }
}
