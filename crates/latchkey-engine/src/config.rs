//! Configuration management for the engine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use latchkey_storage::Paths;

use crate::error::AuthResult;

/// Default identity provider, overridable at build time.
pub const DEFAULT_PROVIDER_URL: &str = match option_env!("LATCHKEY_PROVIDER_URL") {
    Some(url) => url,
    None => "https://id.latchkey.dev",
};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Seconds between provider status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Seconds a login attempt may wait for completion before timing out.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 120;

fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

/// Pacing of the completion poll loop. Stored in milliseconds so tests
/// can run the loop at full speed; the defaults come from the second
/// granularity constants above.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_SECS * 1000,
            timeout_ms: DEFAULT_POLL_TIMEOUT_SECS * 1000,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,

    /// Base URL of the identity provider.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Append a debug marker to session URLs so the provider shows its
    /// diagnostic UI.
    #[serde(default)]
    pub debug_sessions: bool,

    /// Config half of the deterministic-identity gate; the build gate is
    /// the `dev-identity` feature.
    #[serde(default)]
    pub dev_identity_enabled: bool,

    #[serde(default)]
    pub poll: PollConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            debug_sessions: false,
            dev_identity_enabled: false,
            poll: PollConfig::default(),
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Loads from the profile directory, falling back to defaults when no
    /// config file exists. Environment overrides win over the file.
    pub fn load(paths: &Paths) -> AuthResult<Self> {
        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            debug!("No config file found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> AuthResult<Self> {
        let content = fs::read_to_string(path).map_err(latchkey_storage::StorageError::Io)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> AuthResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(paths.config_file(), content).map_err(latchkey_storage::StorageError::Io)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = env_value("LATCHKEY_PROVIDER_URL") {
            self.provider_url = url;
        }
        if let Some(level) = env_value("LATCHKEY_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(value) = env_value("LATCHKEY_DEBUG_SESSIONS") {
            self.debug_sessions = is_truthy(&value);
        }
        if let Some(value) = env_value("LATCHKEY_DEV_IDENTITY") {
            self.dev_identity_enabled = is_truthy(&value);
        }
        self.provider_url = self.provider_url.trim_end_matches('/').to_string();
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}
