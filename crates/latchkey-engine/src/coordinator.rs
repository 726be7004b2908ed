//! Completion coordination for a single login attempt.
//!
//! A delivered callback, the status poll loop, cancellation, and the
//! deadline all race to resolve one oneshot channel; the first signal wins
//! and every exit path tears the poll task down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::PollConfig;
use crate::provider::ProviderClient;

/// Extra wait beyond the poll window before the receiver gives up on its
/// own. The poll task reports the timeout first in the normal case; the
/// backstop only matters if that task died.
const WAIT_GRACE: Duration = Duration::from_secs(1);

/// Opaque payload carried by return navigation. The engine never parses
/// it; the provider redeems it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub raw: String,
}

impl CallbackPayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// The terminal signal of a login attempt. Exactly one is ever produced
/// per attempt, no matter how many sources fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSignal {
    /// Return navigation delivered a payload to redeem.
    Callback(CallbackPayload),
    /// A status poll reported the session complete.
    PollCompleted,
    /// The completion window elapsed.
    TimedOut,
    /// The user abandoned the attempt.
    Cancelled,
}

/// Single-use resolution slot shared by every signal source.
///
/// The first caller to [`Resolver::try_resolve`] wins; the slot empties
/// and every later signal is reported back as lost.
#[derive(Clone)]
pub struct Resolver {
    tx: Arc<Mutex<Option<oneshot::Sender<CompletionSignal>>>>,
}

impl Resolver {
    fn new(tx: oneshot::Sender<CompletionSignal>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Delivers a signal if none has been delivered yet. Returns whether
    /// this signal won.
    pub fn try_resolve(&self, signal: CompletionSignal) -> bool {
        let mut slot = self.tx.lock().unwrap();
        match slot.take() {
            Some(tx) => {
                // The receiver may already be gone; the slot is spent
                // either way.
                let _ = tx.send(signal);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }
}

/// Cancels a running login attempt.
pub struct CancelHandle {
    resolver: Resolver,
}

impl CancelHandle {
    /// Returns `false` if the attempt had already resolved.
    pub fn cancel(&self) -> bool {
        self.resolver.try_resolve(CompletionSignal::Cancelled)
    }
}

/// Races every completion source of one login attempt and yields the
/// winning signal.
///
/// Started per attempt and consumed by [`CompletionCoordinator::wait`];
/// a finished coordinator cannot be reused. Teardown of the poll task
/// happens on every exit path.
pub struct CompletionCoordinator {
    attempt_id: String,
    resolver: Resolver,
    rx: oneshot::Receiver<CompletionSignal>,
    poll_task: JoinHandle<()>,
    poll_window: Duration,
}

impl CompletionCoordinator {
    /// Starts coordinating: spawns the status poll loop and opens the
    /// resolution slot for callback and cancel sources.
    pub fn start(
        attempt_id: String,
        provider: Arc<dyn ProviderClient>,
        public_key: String,
        poll: PollConfig,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        let resolver = Resolver::new(tx);
        let poll_task = tokio::spawn(poll_loop(provider, public_key, poll, resolver.clone()));
        Self {
            attempt_id,
            resolver,
            rx,
            poll_task,
            poll_window: poll.timeout(),
        }
    }

    /// A handle for delivering external signals into this attempt.
    pub fn resolver(&self) -> Resolver {
        self.resolver.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            resolver: self.resolver.clone(),
        }
    }

    /// Waits for the attempt's one terminal signal.
    pub async fn wait(self) -> CompletionSignal {
        let Self {
            attempt_id,
            resolver,
            rx,
            poll_task,
            poll_window,
        } = self;

        let signal = match tokio::time::timeout(poll_window + WAIT_GRACE, rx).await {
            Ok(Ok(signal)) => signal,
            Ok(Err(_)) => {
                // Sender dropped without resolving. Only reachable if the
                // poll task died; treat it as the window closing.
                CompletionSignal::TimedOut
            }
            Err(_) => {
                resolver.try_resolve(CompletionSignal::TimedOut);
                CompletionSignal::TimedOut
            }
        };
        poll_task.abort();
        debug!(attempt_id = %attempt_id, signal = ?signal, "Login attempt resolved");
        signal
    }

    /// Tears the attempt down without waiting for a signal. Used when
    /// presentation fails before the race matters.
    pub fn abort(self) {
        self.resolver.try_resolve(CompletionSignal::Cancelled);
        self.poll_task.abort();
    }
}

/// Polls the provider at interval boundaries until resolution or the
/// deadline. Resolution by any source stops the loop at the next check;
/// transient poll failures ride out the window.
async fn poll_loop(
    provider: Arc<dyn ProviderClient>,
    public_key: String,
    config: PollConfig,
    resolver: Resolver,
) {
    let deadline = Instant::now() + config.timeout();
    loop {
        if resolver.is_resolved() {
            return;
        }
        if Instant::now() >= deadline {
            if resolver.try_resolve(CompletionSignal::TimedOut) {
                debug!("Completion poll window elapsed");
            }
            return;
        }
        match provider.poll_status(&public_key).await {
            Ok(true) => {
                resolver.try_resolve(CompletionSignal::PollCompleted);
                return;
            }
            Ok(false) => {}
            Err(e) => debug!(error = %e, "Status poll failed"),
        }
        tokio::time::sleep(config.interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use latchkey_keys::DelegationChain;

    use crate::error::{AuthError, AuthResult};

    /// Scripted provider: counts polls, optionally fails the first few,
    /// optionally completes on the nth.
    struct ScriptedProvider {
        polls: AtomicUsize,
        complete_on: Option<usize>,
        fail_first: usize,
    }

    impl ScriptedProvider {
        fn never() -> Arc<Self> {
            Arc::new(Self {
                polls: AtomicUsize::new(0),
                complete_on: None,
                fail_first: 0,
            })
        }

        fn completing_on(n: usize) -> Arc<Self> {
            Arc::new(Self {
                polls: AtomicUsize::new(0),
                complete_on: Some(n),
                fail_first: 0,
            })
        }

        fn failing_then_completing(failures: usize, n: usize) -> Arc<Self> {
            Arc::new(Self {
                polls: AtomicUsize::new(0),
                complete_on: Some(n),
                fail_first: failures,
            })
        }

        fn poll_count(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ProviderClient for ScriptedProvider {
        async fn poll_status(&self, _public_key: &str) -> AuthResult<bool> {
            let count = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if count <= self.fail_first {
                return Err(AuthError::Provider(format!("scripted failure {}", count)));
            }
            Ok(self.complete_on.is_some_and(|n| count >= n))
        }

        async fn redeem_callback(
            &self,
            _payload: &CallbackPayload,
        ) -> AuthResult<DelegationChain> {
            Err(AuthError::Provider("not scripted".to_string()))
        }

        async fn fetch_delegation(&self, _public_key: &str) -> AuthResult<DelegationChain> {
            Err(AuthError::Provider("not scripted".to_string()))
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval_ms: 20,
            timeout_ms: 200,
        }
    }

    fn start(provider: Arc<ScriptedProvider>, poll: PollConfig) -> CompletionCoordinator {
        CompletionCoordinator::start("attempt-1".to_string(), provider, "pk".to_string(), poll)
    }

    #[tokio::test]
    async fn test_first_resolution_wins() {
        let (tx, mut rx) = oneshot::channel();
        let resolver = Resolver::new(tx);

        assert!(!resolver.is_resolved());
        assert!(resolver.try_resolve(CompletionSignal::PollCompleted));
        assert!(resolver.is_resolved());
        assert!(!resolver.try_resolve(CompletionSignal::Cancelled));
        assert!(!resolver.try_resolve(CompletionSignal::TimedOut));

        assert_eq!(rx.try_recv().unwrap(), CompletionSignal::PollCompleted);
    }

    #[tokio::test]
    async fn test_callback_signal_resolves_quickly() {
        let provider = ScriptedProvider::never();
        let coordinator = start(provider, fast_poll());
        let resolver = coordinator.resolver();

        let started = std::time::Instant::now();
        resolver.try_resolve(CompletionSignal::Callback(CallbackPayload::new("payload")));
        let signal = coordinator.wait().await;

        assert_eq!(
            signal,
            CompletionSignal::Callback(CallbackPayload::new("payload"))
        );
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_poll_completion_resolves() {
        let provider = ScriptedProvider::completing_on(2);
        let coordinator = start(provider.clone(), fast_poll());

        let signal = coordinator.wait().await;
        assert_eq!(signal, CompletionSignal::PollCompleted);
        assert_eq!(provider.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_times_out_at_window_end() {
        let provider = ScriptedProvider::never();
        let config = fast_poll();
        let coordinator = start(provider.clone(), config);

        let started = std::time::Instant::now();
        let signal = coordinator.wait().await;

        assert_eq!(signal, CompletionSignal::TimedOut);
        assert!(started.elapsed() >= config.timeout());
        assert!(provider.poll_count() >= 1);
    }

    #[tokio::test]
    async fn test_no_polls_after_timeout() {
        let provider = ScriptedProvider::never();
        let coordinator = start(provider.clone(), fast_poll());

        assert_eq!(coordinator.wait().await, CompletionSignal::TimedOut);
        let polls = provider.poll_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.poll_count(), polls);
    }

    #[tokio::test]
    async fn test_cancel_resolves_and_stops_polling() {
        let provider = ScriptedProvider::never();
        let coordinator = start(
            provider.clone(),
            PollConfig {
                interval_ms: 20,
                timeout_ms: 10_000,
            },
        );
        let cancel = coordinator.cancel_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert!(cancel.cancel());
        });

        let started = std::time::Instant::now();
        let signal = coordinator.wait().await;
        assert_eq!(signal, CompletionSignal::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));

        let polls = provider.poll_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.poll_count(), polls);
    }

    #[tokio::test]
    async fn test_resolution_stops_polling_before_teardown() {
        let provider = ScriptedProvider::never();
        let coordinator = start(
            provider.clone(),
            PollConfig {
                interval_ms: 20,
                timeout_ms: 10_000,
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(provider.poll_count() >= 1);

        coordinator
            .resolver()
            .try_resolve(CompletionSignal::PollCompleted);
        // The loop observes the resolved slot on its own, without abort.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let polls = provider.poll_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.poll_count(), polls);
    }

    #[tokio::test]
    async fn test_simultaneous_signals_yield_one_winner() {
        let provider = ScriptedProvider::never();
        let coordinator = start(provider, fast_poll());
        let first = coordinator.resolver();
        let second = coordinator.resolver();

        assert!(first.try_resolve(CompletionSignal::Callback(CallbackPayload::new("win"))));
        assert!(!second.try_resolve(CompletionSignal::PollCompleted));

        assert!(matches!(
            coordinator.wait().await,
            CompletionSignal::Callback(_)
        ));
    }

    #[tokio::test]
    async fn test_late_signals_after_timeout_are_lost() {
        let provider = ScriptedProvider::never();
        let coordinator = start(provider, fast_poll());
        let resolver = coordinator.resolver();

        assert_eq!(coordinator.wait().await, CompletionSignal::TimedOut);
        assert!(!resolver.try_resolve(CompletionSignal::Callback(CallbackPayload::new("late"))));
    }

    #[tokio::test]
    async fn test_abort_tears_down() {
        let provider = ScriptedProvider::never();
        let coordinator = start(
            provider.clone(),
            PollConfig {
                interval_ms: 20,
                timeout_ms: 10_000,
            },
        );
        let resolver = coordinator.resolver();

        coordinator.abort();
        assert!(resolver.is_resolved());

        tokio::time::sleep(Duration::from_millis(60)).await;
        let polls = provider.poll_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.poll_count(), polls);
    }

    #[tokio::test]
    async fn test_poll_errors_ride_out_the_window() {
        let provider = ScriptedProvider::failing_then_completing(2, 3);
        let coordinator = start(provider.clone(), fast_poll());

        let signal = coordinator.wait().await;
        assert_eq!(signal, CompletionSignal::PollCompleted);
        assert_eq!(provider.poll_count(), 3);
    }
}
