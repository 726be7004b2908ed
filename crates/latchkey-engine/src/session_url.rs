//! Session page URL construction.

use url::Url;

use crate::error::AuthResult;

/// Path of the provider's session creation page.
const SESSION_PATH: &str = "session/new";

/// Transport hint embedded in the session URL so the provider can adapt
/// its completion behavior to how the page was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportTag {
    /// Page is shown inside an embedded browser sheet.
    EmbeddedWebview,
    /// Page opened in the system browser with a callback scheme waiting.
    NativeExternalBrowser,
    /// No return channel; the provider shows a plain completion page and
    /// the engine relies on polling.
    #[default]
    ModernWeb,
}

impl TransportTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportTag::EmbeddedWebview => "embedded-webview",
            TransportTag::NativeExternalBrowser => "native-external-browser",
            TransportTag::ModernWeb => "modern-web",
        }
    }
}

/// Builds the session URL handed to the presentation layer.
///
/// Carries the public key, the transport tag, and optionally a debug
/// marker. Nothing else; private key material never appears in a URL.
pub fn build_session_url(
    provider_base: &str,
    public_key: &str,
    tag: TransportTag,
    debug: bool,
) -> AuthResult<Url> {
    let base = provider_base.trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/{}", base, SESSION_PATH))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("pubkey", public_key);
        pairs.append_pair("deep-link-type", tag.as_str());
        if debug {
            pairs.append_pair("debug", "1");
        }
    }
    Ok(url)
}

/// Session URL for an alternate provider flow. Same page, same pipeline;
/// the provider parameter routes the user through a different upstream.
pub fn build_alternate_session_url(
    provider_base: &str,
    alternate_provider: &str,
    public_key: &str,
    tag: TransportTag,
    debug: bool,
) -> AuthResult<Url> {
    let mut url = build_session_url(provider_base, public_key, tag, debug)?;
    url.query_pairs_mut()
        .append_pair("provider", alternate_provider);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://id.example.com";
    const PUBKEY: &str = "dGVzdC1wdWJsaWMta2V5";

    #[test]
    fn test_url_shape() {
        let url = build_session_url(BASE, PUBKEY, TransportTag::ModernWeb, false).unwrap();
        assert_eq!(url.host_str(), Some("id.example.com"));
        assert_eq!(url.path(), "/session/new");
    }

    #[test]
    fn test_public_key_is_carried() {
        let url = build_session_url(BASE, PUBKEY, TransportTag::ModernWeb, false).unwrap();
        let pubkey = url
            .query_pairs()
            .find(|(name, _)| name == "pubkey")
            .map(|(_, value)| value.into_owned());
        assert_eq!(pubkey, Some(PUBKEY.to_string()));
    }

    #[test]
    fn test_transport_tags() {
        for (tag, expected) in [
            (TransportTag::EmbeddedWebview, "embedded-webview"),
            (TransportTag::NativeExternalBrowser, "native-external-browser"),
            (TransportTag::ModernWeb, "modern-web"),
        ] {
            let url = build_session_url(BASE, PUBKEY, tag, false).unwrap();
            let value = url
                .query_pairs()
                .find(|(name, _)| name == "deep-link-type")
                .map(|(_, value)| value.into_owned());
            assert_eq!(value, Some(expected.to_string()));
        }
    }

    #[test]
    fn test_default_tag_is_modern_web() {
        assert_eq!(TransportTag::default(), TransportTag::ModernWeb);
    }

    #[test]
    fn test_debug_marker_only_when_enabled() {
        let plain = build_session_url(BASE, PUBKEY, TransportTag::ModernWeb, false).unwrap();
        assert!(!plain.query_pairs().any(|(name, _)| name == "debug"));

        let debug = build_session_url(BASE, PUBKEY, TransportTag::ModernWeb, true).unwrap();
        let value = debug
            .query_pairs()
            .find(|(name, _)| name == "debug")
            .map(|(_, value)| value.into_owned());
        assert_eq!(value, Some("1".to_string()));
    }

    #[test]
    fn test_trailing_slash_on_base() {
        let url = build_session_url(
            "https://id.example.com/",
            PUBKEY,
            TransportTag::ModernWeb,
            false,
        )
        .unwrap();
        assert_eq!(url.path(), "/session/new");
    }

    #[test]
    fn test_key_with_reserved_characters_is_encoded() {
        let key = "AB+CD/EF==";
        let url = build_session_url(BASE, key, TransportTag::ModernWeb, false).unwrap();
        // The raw query escapes reserved characters and decodes back intact.
        let decoded = url
            .query_pairs()
            .find(|(name, _)| name == "pubkey")
            .map(|(_, value)| value.into_owned());
        assert_eq!(decoded, Some(key.to_string()));
    }

    #[test]
    fn test_alternate_provider_param() {
        let url =
            build_alternate_session_url(BASE, "github", PUBKEY, TransportTag::ModernWeb, false)
                .unwrap();
        let provider = url
            .query_pairs()
            .find(|(name, _)| name == "provider")
            .map(|(_, value)| value.into_owned());
        assert_eq!(provider, Some("github".to_string()));
        // Everything else matches the primary flow.
        assert_eq!(url.path(), "/session/new");
        assert!(url.query_pairs().any(|(name, _)| name == "pubkey"));
    }

    #[test]
    fn test_invalid_base_is_an_error() {
        assert!(build_session_url("not a url", PUBKEY, TransportTag::ModernWeb, false).is_err());
    }
}
