//! Runtime capability detection.
//!
//! Answers one question for the login flow: what can this process do
//! right now? Capabilities are probed fresh on every call because a
//! runtime can change shape between attempts, for example when a desktop
//! session ends and leaves the process headless.

mod capabilities;

pub use capabilities::{
    probe, CapabilityProbe, EnvCapabilityProbe, RuntimeCapabilities, StaticCapabilityProbe,
};
