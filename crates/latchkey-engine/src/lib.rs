//! Latchkey login engine.
//!
//! Drives the full delegated login flow for a device-held identity:
//!
//! - ensures an Ed25519 key pair exists in sanitized storage
//! - builds the hosted provider session URL for the device's transport
//! - presents it (system browser, embedded sheet, or polling fallback)
//! - races the return callback against a status poll, first signal wins
//! - redeems the winning signal for a delegation chain and binds it to
//!   the held key
//!
//! [`AuthEngine`] is the entry point. The session lives in
//! [`SessionStore`] and every observable outcome is an [`AuthSnapshot`].

mod config;
mod coordinator;
#[cfg(any(test, feature = "dev-identity"))]
pub mod dev_identity;
mod engine;
mod error;
mod logging;
mod machine;
mod provider;
mod session_url;
mod store;
mod transport;

pub use config::{
    Config, PollConfig, DEFAULT_LOG_LEVEL, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS,
    DEFAULT_PROVIDER_URL,
};
pub use coordinator::{
    CallbackPayload, CancelHandle, CompletionCoordinator, CompletionSignal, Resolver,
};
pub use engine::AuthEngine;
pub use error::{AuthError, AuthResult};
pub use logging::{init_logging, parse_level};
pub use machine::{session_machine, SessionMachine, SessionMachineInput, SessionMachineState};
pub use provider::{HttpProviderClient, ProviderClient};
pub use session_url::{build_alternate_session_url, build_session_url, TransportTag};
pub use store::{
    AuthSnapshot, SessionStatus, SessionStatusCallback, SessionStatusChangedPayload, SessionStore,
};
pub use transport::{select_strategy, SystemBrowserPresenter, TransportStrategy, UrlPresenter};
