//! Runtime capability probing.
//!
//! Each capability flag can be forced through a `LATCHKEY_*` environment
//! variable; heuristics only fill in where no flag is set.

use tracing::debug;

/// What the current runtime can do during a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeCapabilities {
    /// A callback URL scheme is registered for return navigation.
    pub callback_scheme_registered: bool,
    /// An external browser can be opened.
    pub external_browser: bool,
    /// The host can present an embedded browser sheet.
    pub embedded_sheet: bool,
    /// The process runs inside a constrained shell (kiosk, SSH session,
    /// restricted sandbox) where nothing can be presented directly.
    pub constrained_shell: bool,
}

/// Probes the process environment for runtime capabilities.
///
/// Explicit `LATCHKEY_*` flags override every heuristic, which keeps
/// embedding shells and CI in control of the outcome.
pub fn probe() -> RuntimeCapabilities {
    let capabilities = RuntimeCapabilities {
        callback_scheme_registered: env_flag("LATCHKEY_CALLBACK_SCHEME_REGISTERED")
            .unwrap_or(false),
        external_browser: env_flag("LATCHKEY_EXTERNAL_BROWSER")
            .unwrap_or_else(default_external_browser),
        embedded_sheet: env_flag("LATCHKEY_EMBEDDED_SHEET").unwrap_or(false),
        constrained_shell: env_flag("LATCHKEY_CONSTRAINED_SHELL").unwrap_or(false),
    };
    debug!(?capabilities, "Probed runtime capabilities");
    capabilities
}

fn default_external_browser() -> bool {
    // Headless Linux has no display server to hand a URL to.
    if cfg!(target_os = "linux") {
        std::env::var("DISPLAY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                std::env::var("WAYLAND_DISPLAY")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .is_some()
    } else {
        true
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok().filter(|v| !v.trim().is_empty())?;
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Source of capability information for a login attempt.
///
/// The engine asks the probe before every attempt; implementations must
/// not cache results on its behalf.
pub trait CapabilityProbe: Send + Sync {
    fn probe(&self) -> RuntimeCapabilities;
}

/// Probes the process environment on every call.
#[derive(Debug, Default)]
pub struct EnvCapabilityProbe;

impl CapabilityProbe for EnvCapabilityProbe {
    fn probe(&self) -> RuntimeCapabilities {
        probe()
    }
}

/// A fixed capability set for shells that know their own runtime shape,
/// such as a desktop app that always ships an embedded sheet.
#[derive(Debug)]
pub struct StaticCapabilityProbe {
    capabilities: RuntimeCapabilities,
}

impl StaticCapabilityProbe {
    pub fn new(capabilities: RuntimeCapabilities) -> Self {
        Self { capabilities }
    }
}

impl CapabilityProbe for StaticCapabilityProbe {
    fn probe(&self) -> RuntimeCapabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_flag_parses_truthy_values() {
        std::env::set_var("LATCHKEY_TEST_FLAG_TRUE", "true");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_TRUE"), Some(true));
        std::env::set_var("LATCHKEY_TEST_FLAG_TRUE", "1");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_TRUE"), Some(true));
        std::env::set_var("LATCHKEY_TEST_FLAG_TRUE", "YES");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_TRUE"), Some(true));
        std::env::remove_var("LATCHKEY_TEST_FLAG_TRUE");
    }

    #[test]
    fn test_env_flag_parses_falsy_values() {
        std::env::set_var("LATCHKEY_TEST_FLAG_FALSE", "false");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_FALSE"), Some(false));
        std::env::set_var("LATCHKEY_TEST_FLAG_FALSE", "0");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_FALSE"), Some(false));
        std::env::remove_var("LATCHKEY_TEST_FLAG_FALSE");
    }

    #[test]
    fn test_env_flag_ignores_blank_and_garbage() {
        std::env::set_var("LATCHKEY_TEST_FLAG_ODD", "  ");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_ODD"), None);
        std::env::set_var("LATCHKEY_TEST_FLAG_ODD", "maybe");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_ODD"), None);
        std::env::remove_var("LATCHKEY_TEST_FLAG_ODD");
        assert_eq!(env_flag("LATCHKEY_TEST_FLAG_ODD"), None);
    }

    #[test]
    fn test_static_probe_returns_fixed_set() {
        let capabilities = RuntimeCapabilities {
            callback_scheme_registered: true,
            external_browser: true,
            embedded_sheet: false,
            constrained_shell: false,
        };
        let probe = StaticCapabilityProbe::new(capabilities);
        assert_eq!(probe.probe(), capabilities);
        assert_eq!(probe.probe(), capabilities);
    }
}
