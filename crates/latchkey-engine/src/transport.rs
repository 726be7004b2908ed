//! Transport strategy selection.
//!
//! Strategy selection is a pure function of freshly probed capabilities.
//! Presentation goes through the `UrlPresenter` trait so hosts with their
//! own surfaces can substitute the system browser hand-off.

use tracing::info;
use url::Url;

use latchkey_runtime::RuntimeCapabilities;

use crate::error::{AuthError, AuthResult};
use crate::session_url::TransportTag;

/// How a login attempt reaches the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStrategy {
    /// Open the system browser and wait for return navigation.
    ExternalBrowser,
    /// Present an embedded browser sheet inside the host.
    EmbeddedSheet,
    /// Open whatever browser exists and rely on status polling alone.
    PollingFallback,
}

impl TransportStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportStrategy::ExternalBrowser => "external-browser",
            TransportStrategy::EmbeddedSheet => "embedded-sheet",
            TransportStrategy::PollingFallback => "polling-fallback",
        }
    }

    /// The tag embedded in the session URL for this strategy.
    pub fn transport_tag(&self) -> TransportTag {
        match self {
            TransportStrategy::ExternalBrowser => TransportTag::NativeExternalBrowser,
            TransportStrategy::EmbeddedSheet => TransportTag::EmbeddedWebview,
            TransportStrategy::PollingFallback => TransportTag::ModernWeb,
        }
    }
}

/// Picks the strategy for one attempt from freshly probed capabilities.
///
/// A constrained shell forces the polling fallback no matter what else
/// the runtime claims, since nothing can be presented from inside it.
/// Otherwise the richest usable path wins: external browser with a
/// registered callback scheme, then an embedded sheet, then polling.
pub fn select_strategy(capabilities: &RuntimeCapabilities) -> AuthResult<TransportStrategy> {
    if capabilities.constrained_shell {
        return Ok(TransportStrategy::PollingFallback);
    }
    if capabilities.callback_scheme_registered && capabilities.external_browser {
        return Ok(TransportStrategy::ExternalBrowser);
    }
    if capabilities.embedded_sheet {
        return Ok(TransportStrategy::EmbeddedSheet);
    }
    if capabilities.external_browser {
        return Ok(TransportStrategy::PollingFallback);
    }
    Err(AuthError::TransportUnavailable)
}

/// Puts a session URL in front of the user.
pub trait UrlPresenter: Send + Sync {
    fn present(&self, url: &Url, strategy: TransportStrategy) -> AuthResult<()>;
}

/// Presents by handing the URL to the operating system's default browser.
///
/// Cannot host an embedded sheet; shells with one supply their own
/// presenter.
#[derive(Debug, Default)]
pub struct SystemBrowserPresenter;

impl UrlPresenter for SystemBrowserPresenter {
    fn present(&self, url: &Url, strategy: TransportStrategy) -> AuthResult<()> {
        match strategy {
            TransportStrategy::ExternalBrowser | TransportStrategy::PollingFallback => {
                info!(strategy = strategy.as_str(), "Opening session URL in system browser");
                open::that_detached(url.as_str()).map_err(|e| {
                    AuthError::Presentation(format!("Failed to open browser: {}", e))
                })
            }
            TransportStrategy::EmbeddedSheet => Err(AuthError::Presentation(
                "No embedded sheet host in this process".to_string(),
            )),
        }
    }
}
