//! The login engine facade.
//!
//! This module centralizes login behavior so embedding shells use one
//! shared authority for sign-in, logout, status, and callback delivery.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use latchkey_keys::{KeyMaterial, SessionIdentity};
use latchkey_runtime::{CapabilityProbe, EnvCapabilityProbe};
use latchkey_storage::{repair, FileStorage, Paths, SessionStorage, StorageKeys};

use crate::config::Config;
use crate::coordinator::{CallbackPayload, CompletionCoordinator, CompletionSignal, Resolver};
use crate::error::{AuthError, AuthResult};
use crate::provider::{HttpProviderClient, ProviderClient};
use crate::session_url::{build_alternate_session_url, build_session_url};
use crate::store::{
    AuthSnapshot, SessionStatus, SessionStatusCallback, SessionStore,
};
use crate::transport::{select_strategy, SystemBrowserPresenter, TransportStrategy, UrlPresenter};

/// Alternate upstreams the provider can route a login through. The flow
/// is identical to the primary one; only the session URL differs.
const ALTERNATE_PROVIDERS: &[&str] = &["github", "google"];

struct ActiveAttempt {
    attempt_id: String,
    resolver: Resolver,
}

/// Bookkeeping record written for the duration of one attempt and
/// removed when it resolves. Records found at startup are stale and get
/// swept by the storage sanitation pass.
#[derive(Debug, Serialize)]
struct PendingAttempt {
    attempt_id: String,
    strategy: String,
    started_at: String,
}

/// The login engine.
///
/// Owns the session store, key material, and the currently running
/// attempt. One engine serves one profile; all methods take `&self` and
/// are safe to call from any task.
pub struct AuthEngine {
    config: Config,
    storage: Arc<dyn SessionStorage>,
    key_material: KeyMaterial,
    provider: Arc<dyn ProviderClient>,
    presenter: Arc<dyn UrlPresenter>,
    probe: Arc<dyn CapabilityProbe>,
    store: SessionStore,
    active_attempt: Mutex<Option<ActiveAttempt>>,
}

impl AuthEngine {
    /// Creates an engine with the default wiring: file-backed storage
    /// under the profile directory, the hosted provider over HTTP, and
    /// the system browser as presenter.
    pub fn new(config: Config) -> AuthResult<Self> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::new(paths.store_file())?);
        let provider: Arc<dyn ProviderClient> =
            Arc::new(HttpProviderClient::new(config.provider_url.clone()));
        Self::with_components(
            config,
            storage,
            provider,
            Arc::new(SystemBrowserPresenter),
            Arc::new(EnvCapabilityProbe),
        )
    }

    /// Creates an engine from explicit components. Embedding shells use
    /// this to supply their own presenter or probe; tests script every
    /// part.
    pub fn with_components(
        config: Config,
        storage: Arc<dyn SessionStorage>,
        provider: Arc<dyn ProviderClient>,
        presenter: Arc<dyn UrlPresenter>,
        probe: Arc<dyn CapabilityProbe>,
    ) -> AuthResult<Self> {
        // Sanitation must finish before anything reads the fixed keys.
        repair::sanitize_at_startup(storage.as_ref())?;
        Ok(Self {
            key_material: KeyMaterial::new(storage.clone()),
            store: SessionStore::new(),
            active_attempt: Mutex::new(None),
            config,
            storage,
            provider,
            presenter,
            probe,
        })
    }

    /// Runs one full login attempt against the primary provider and
    /// waits for it to resolve.
    ///
    /// Cancellation is not an error: the returned snapshot simply shows
    /// `Unauthenticated`. Every failure resolves the session to `Error`
    /// with the message retained for display.
    pub async fn sign_in(&self) -> AuthResult<AuthSnapshot> {
        self.sign_in_inner(None).await
    }

    /// Like [`AuthEngine::sign_in`], routed through an alternate
    /// upstream provider.
    pub async fn sign_in_with(&self, alternate_provider: &str) -> AuthResult<AuthSnapshot> {
        if !ALTERNATE_PROVIDERS.contains(&alternate_provider) {
            return Err(AuthError::Config(format!(
                "Unsupported alternate provider: {} (supported: {})",
                alternate_provider,
                ALTERNATE_PROVIDERS.join(", ")
            )));
        }
        self.sign_in_inner(Some(alternate_provider)).await
    }

    async fn sign_in_inner(&self, alternate_provider: Option<&str>) -> AuthResult<AuthSnapshot> {
        self.store.begin_authentication()?;
        match self.run_attempt(alternate_provider).await {
            Ok(identity) => {
                let account_id = identity.account().id.clone();
                self.store.resolve_success(identity)?;
                info!(account_id = %account_id, "Login complete");
                Ok(self.store.snapshot())
            }
            Err(AuthError::Cancelled) => {
                self.store.cancel()?;
                info!("Login attempt cancelled");
                Ok(self.store.snapshot())
            }
            Err(error) => {
                warn!(error = %error, "Login attempt failed");
                self.store.resolve_failure(&error)?;
                Err(error)
            }
        }
    }

    async fn run_attempt(
        &self,
        alternate_provider: Option<&str>,
    ) -> AuthResult<SessionIdentity> {
        let public_key = self.key_material.ensure_key_pair()?;

        // Capabilities are probed fresh for every attempt.
        let capabilities = self.probe.probe();
        let strategy = select_strategy(&capabilities)?;
        let tag = strategy.transport_tag();
        let url = match alternate_provider {
            Some(provider) => build_alternate_session_url(
                &self.config.provider_url,
                provider,
                &public_key,
                tag,
                self.config.debug_sessions,
            )?,
            None => build_session_url(
                &self.config.provider_url,
                &public_key,
                tag,
                self.config.debug_sessions,
            )?,
        };

        let attempt_id = Uuid::new_v4().to_string();
        self.record_pending_attempt(&attempt_id, strategy)?;
        let coordinator = CompletionCoordinator::start(
            attempt_id.clone(),
            self.provider.clone(),
            public_key.clone(),
            self.config.poll,
        );
        *self.active_attempt.lock().unwrap() = Some(ActiveAttempt {
            attempt_id: attempt_id.clone(),
            resolver: coordinator.resolver(),
        });
        info!(
            attempt_id = %attempt_id,
            strategy = strategy.as_str(),
            "Starting login attempt"
        );

        if let Err(error) = self.presenter.present(&url, strategy) {
            coordinator.abort();
            self.finish_attempt(&attempt_id);
            return Err(error);
        }

        let signal = coordinator.wait().await;
        self.finish_attempt(&attempt_id);

        match signal {
            CompletionSignal::Callback(payload) => {
                debug!(attempt_id = %attempt_id, "Return navigation won the completion race");
                let chain = self.provider.redeem_callback(&payload).await?;
                Ok(self.key_material.current_identity(chain)?)
            }
            CompletionSignal::PollCompleted => {
                debug!(attempt_id = %attempt_id, "Status poll won the completion race");
                let chain = self.provider.fetch_delegation(&public_key).await?;
                Ok(self.key_material.current_identity(chain)?)
            }
            CompletionSignal::TimedOut => Err(AuthError::Timeout),
            CompletionSignal::Cancelled => Err(AuthError::Cancelled),
        }
    }

    /// Delivers a callback payload from return navigation into the
    /// running attempt. Returns whether the payload was accepted; a
    /// payload with no attempt running, or arriving after resolution, is
    /// reported back as not accepted.
    pub fn deliver_callback(&self, payload: CallbackPayload) -> bool {
        let attempt = self.active_attempt.lock().unwrap();
        match attempt.as_ref() {
            Some(active) => {
                let accepted = active
                    .resolver
                    .try_resolve(CompletionSignal::Callback(payload));
                if !accepted {
                    debug!(
                        attempt_id = %active.attempt_id,
                        "Callback arrived after the attempt resolved"
                    );
                }
                accepted
            }
            None => {
                debug!("Callback arrived with no login attempt running");
                false
            }
        }
    }

    /// Cancels the running attempt, if any. Returns whether a running
    /// attempt was actually cancelled.
    pub fn cancel_sign_in(&self) -> bool {
        let attempt = self.active_attempt.lock().unwrap();
        match attempt.as_ref() {
            Some(active) => {
                info!(attempt_id = %active.attempt_id, "Cancelling login attempt");
                active.resolver.try_resolve(CompletionSignal::Cancelled)
            }
            None => false,
        }
    }

    /// Clears the in-memory session. Persisted key material stays, so
    /// the next login resolves to the same account.
    pub fn logout(&self) -> AuthSnapshot {
        let status = self.store.logout();
        info!(status = ?status, "Logged out; key material retained");
        self.store.snapshot()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.store.snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.store.status()
    }

    /// The signing identity of the authenticated session.
    pub fn session_identity(&self) -> Option<SessionIdentity> {
        self.store.identity()
    }

    /// Registers the status-change callback, replacing any previous one.
    pub fn set_status_callback(&self, callback: SessionStatusCallback) {
        self.store.set_status_callback(callback);
    }

    /// Enters an authenticated session with the deterministic development
    /// identity, without any provider involvement.
    ///
    /// Doubly gated: compiled only for tests or with the `dev-identity`
    /// feature, and refused unless the config enables it too.
    #[cfg(any(test, feature = "dev-identity"))]
    pub fn use_deterministic_identity(&self) -> AuthResult<AuthSnapshot> {
        if !self.config.dev_identity_enabled {
            return Err(AuthError::Config(
                "Deterministic identity is disabled; set dev_identity_enabled or LATCHKEY_DEV_IDENTITY=1"
                    .to_string(),
            ));
        }
        warn!("Using deterministic development identity; session carries no delegation");
        self.store.begin_authentication()?;
        self.store
            .resolve_success(crate::dev_identity::deterministic_identity())?;
        Ok(self.store.snapshot())
    }

    fn record_pending_attempt(
        &self,
        attempt_id: &str,
        strategy: TransportStrategy,
    ) -> AuthResult<()> {
        let record = PendingAttempt {
            attempt_id: attempt_id.to_string(),
            strategy: strategy.as_str().to_string(),
            started_at: Utc::now().to_rfc3339(),
        };
        self.storage.set(
            &StorageKeys::provider_session(attempt_id),
            &serde_json::to_string(&record)?,
        )?;
        Ok(())
    }

    fn finish_attempt(&self, attempt_id: &str) {
        *self.active_attempt.lock().unwrap() = None;
        if let Err(error) = self
            .storage
            .delete(&StorageKeys::provider_session(attempt_id))
        {
            debug!(error = %error, "Failed to clear pending attempt record");
        }
    }
}
