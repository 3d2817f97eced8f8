//! Configuration file parser for ~/.config/feedtree/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, with a warning logged for each so
//! typos do not go unnoticed.
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `auth_token` from the file.
pub const TOKEN_ENV_VAR: &str = "FEEDTREE_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Every field has a default so any subset of keys can be given. `Debug`
/// is implemented by hand to keep the auth token out of logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the reader API, e.g. `https://reader.example.com/api`.
    pub server_url: String,

    /// Pre-issued session token, forwarded as the `auth_token` cookie.
    /// `FEEDTREE_TOKEN` takes precedence.
    pub auth_token: Option<String>,

    /// Seconds between background tree resyncs. 0 disables them.
    pub refresh_interval_secs: u64,

    /// Start with the tree filtered to subscriptions with unread articles.
    pub unread_only: bool,

    /// Articles requested per page in the article panel.
    pub article_page_size: u32,

    /// Theme variant name ("dark" or "light").
    pub theme: String,

    /// Keybinding overrides: action name to key string.
    pub keybindings: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080/api".to_string(),
            auth_token: None,
            refresh_interval_secs: 60,
            unread_only: false,
            article_page_size: 50,
            theme: "dark".to_string(),
            keybindings: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("unread_only", &self.unread_only)
            .field("article_page_size", &self.article_page_size)
            .field("theme", &self.theme)
            .field("keybindings", &self.keybindings)
            .finish()
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "server_url",
        "auth_token",
        "refresh_interval_secs",
        "unread_only",
        "article_page_size",
        "theme",
        "keybindings",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - File over 1 MB → `Err(ConfigError::TooLarge)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            server = %config.server_url,
            theme = %config.theme,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// The token to send, preferring `env_token` (the value of
    /// `FEEDTREE_TOKEN`) over the file. Blank values count as absent.
    pub fn resolve_token(&self, env_token: Option<String>) -> Option<SecretString> {
        env_token
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.auth_token.clone().filter(|t| !t.trim().is_empty()))
            .map(SecretString::from)
    }

    /// `None` when periodic resync is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

// ============================================================================
// Tests
// ============================================================================
