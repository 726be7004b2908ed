//! Session state machine using rust-fsm.
//!
//! This module defines an explicit finite state machine for the session
//! lifecycle; session status is read from the machine rather than derived
//! from what storage happens to contain.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │ Unauthenticated │ (initial)
//! └────────┬────────┘
//!          │ BeginAuthentication
//!          ▼
//! ┌─────────────────┐  ResolveFailure  ┌─────────────────┐
//! │ Authenticating  │ ───────────────► │      Error      │
//! └────────┬────────┘ ◄─────────────── └─────────────────┘
//!          │ ResolveSuccess   BeginAuthentication
//!          ▼
//! ┌─────────────────┐
//! │  Authenticated  │
//! └─────────────────┘
//! ```
//!
//! `Cancel` returns `Authenticating` to `Unauthenticated`; `Logout` returns
//! `Authenticated` or `Error` to `Unauthenticated`.

use rust_fsm::*;

// Authenticating is the only transient state; it is left by exactly one
// resolution input per attempt.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        BeginAuthentication => Authenticating
    },
    Authenticating => {
        ResolveSuccess => Authenticated,
        ResolveFailure => Error,
        Cancel => Unauthenticated
    },
    Authenticated => {
        Logout => Unauthenticated
    },
    Error => {
        BeginAuthentication => Authenticating,
        Logout => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;
