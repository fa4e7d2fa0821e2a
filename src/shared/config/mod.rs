//! Application configuration module
//!
//! Provides the configuration types for the auth layer: which backend to use,
//! the identifiers each backend needs, and the polling parameters of the
//! Appwrite fallback engine.
//!
//! # Configuration Sources
//!
//! - Environment variables via [`AuthConfig::from_env`]
//! - A TOML document via [`AuthConfig::from_toml_str`] / [`AuthConfig::from_file`]
//! - Programmatic construction via [`AuthConfig::builder`]
//!
//! Missing backend identifiers are *not* rejected here. They are reported as
//! [`ConfigError::MissingValue`] when the adapter for that backend is built,
//! so an application can still start in auth-disabled mode.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Selects the backend implementation
pub const ENV_BACKEND: &str = "BAMBOO_BACKEND";
/// Supabase project URL
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
/// Supabase anonymous API key
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
/// Appwrite API endpoint (e.g. `https://cloud.appwrite.io/v1`)
pub const ENV_APPWRITE_ENDPOINT: &str = "APPWRITE_ENDPOINT";
/// Appwrite project id
pub const ENV_APPWRITE_PROJECT_ID: &str = "APPWRITE_PROJECT_ID";
/// Public origin of the web app, used to build redirect links
pub const ENV_SITE_URL: &str = "BAMBOO_SITE_URL";

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(3_000);
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(60_000);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REALTIME_LIVENESS: Duration = Duration::from_secs(90);

/// Identity backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Supabase GoTrue (native push-based session events)
    #[default]
    Supabase,
    /// Appwrite Account API (session events emulated by realtime or polling)
    Appwrite,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "supabase" => Ok(Self::Supabase),
            "appwrite" => Ok(Self::Appwrite),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supabase => f.write_str("supabase"),
            Self::Appwrite => f.write_str("appwrite"),
        }
    }
}

/// Supabase project identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl SupabaseConfig {
    /// Return the parsed project URL and anon key, or the first missing value
    pub fn require(&self) -> Result<(Url, String), ConfigError> {
        let url = non_empty(self.url.as_deref()).ok_or(ConfigError::MissingValue(ENV_SUPABASE_URL))?;
        let anon_key = non_empty(self.anon_key.as_deref())
            .ok_or(ConfigError::MissingValue(ENV_SUPABASE_ANON_KEY))?;
        Ok((parse_url(url)?, anon_key.to_string()))
    }
}

/// Appwrite project identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppwriteConfig {
    pub endpoint: Option<String>,
    pub project_id: Option<String>,
}

impl AppwriteConfig {
    /// Return the parsed endpoint and project id, or the first missing value
    pub fn require(&self) -> Result<(Url, String), ConfigError> {
        let endpoint = non_empty(self.endpoint.as_deref())
            .ok_or(ConfigError::MissingValue(ENV_APPWRITE_ENDPOINT))?;
        let project_id = non_empty(self.project_id.as_deref())
            .ok_or(ConfigError::MissingValue(ENV_APPWRITE_PROJECT_ID))?;
        Ok((parse_url(endpoint)?, project_id.to_string()))
    }
}

/// Timing parameters of the Appwrite session watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Interval after a successful fetch
    pub base_delay: Duration,
    /// Upper bound of the backoff and the cooldown interval after a 401
    pub max_delay: Duration,
    /// Per-fetch timeout; a timeout counts as a failed fetch
    pub fetch_timeout: Duration,
    /// Maximum silence tolerated on a realtime channel before falling back to polling
    pub realtime_liveness: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            realtime_liveness: Some(DEFAULT_REALTIME_LIVENESS),
        }
    }
}

impl PollSettings {
    /// Build settings, clamping so that `0 < base_delay <= max_delay`
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        let base_delay = base_delay.max(Duration::from_millis(1));
        let max_delay = max_delay.max(base_delay);
        Self {
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn with_realtime_liveness(mut self, liveness: Option<Duration>) -> Self {
        self.realtime_liveness = liveness;
        self
    }
}

/// Auth layer configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthConfig {
    /// Backend selected for this process
    pub backend: BackendKind,
    pub supabase: SupabaseConfig,
    pub appwrite: AppwriteConfig,
    pub polling: PollSettings,
    /// Public origin of the web app (e.g. `https://journal.example.com`)
    pub site_url: Option<String>,
}

impl AuthConfig {
    /// Create a new AuthConfigBuilder
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Ok(backend) = std::env::var(ENV_BACKEND) {
            builder = builder.backend(backend.parse()?);
        }
        builder.supabase = SupabaseConfig {
            url: std::env::var(ENV_SUPABASE_URL).ok(),
            anon_key: std::env::var(ENV_SUPABASE_ANON_KEY).ok(),
        };
        builder.appwrite = AppwriteConfig {
            endpoint: std::env::var(ENV_APPWRITE_ENDPOINT).ok(),
            project_id: std::env::var(ENV_APPWRITE_PROJECT_ID).ok(),
        };
        builder.site_url = std::env::var(ENV_SITE_URL).ok();
        builder.build()
    }

    /// Parse configuration from a TOML document
    ///
    /// ```toml
    /// backend = "appwrite"
    /// site_url = "https://journal.example.com"
    ///
    /// [appwrite]
    /// endpoint = "https://cloud.appwrite.io/v1"
    /// project_id = "bamboo"
    ///
    /// [polling]
    /// base_delay_ms = 3000
    /// max_delay_ms = 60000
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Join a path onto the configured site URL
    pub fn site_link(&self, path: &str) -> Option<String> {
        let base = non_empty(self.site_url.as_deref())?;
        Some(format!("{}{}", base.trim_end_matches('/'), path))
    }

    /// Validate the values that are present
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [
            self.supabase.url.as_deref(),
            self.appwrite.endpoint.as_deref(),
            self.site_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|u| !u.trim().is_empty())
        {
            parse_url(url)?;
        }
        Ok(())
    }
}

/// Builder for AuthConfig
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    backend: BackendKind,
    supabase: SupabaseConfig,
    appwrite: AppwriteConfig,
    polling: PollSettings,
    site_url: Option<String>,
}

impl AuthConfigBuilder {
    /// Select the backend
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the Supabase project URL and anon key
    pub fn supabase(mut self, url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        self.supabase = SupabaseConfig {
            url: Some(url.into()),
            anon_key: Some(anon_key.into()),
        };
        self
    }

    /// Set the Appwrite endpoint and project id
    pub fn appwrite(mut self, endpoint: impl Into<String>, project_id: impl Into<String>) -> Self {
        self.appwrite = AppwriteConfig {
            endpoint: Some(endpoint.into()),
            project_id: Some(project_id.into()),
        };
        self
    }

    /// Override the polling parameters
    pub fn polling(mut self, polling: PollSettings) -> Self {
        self.polling = polling;
        self
    }

    /// Set the public site URL
    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AuthConfig, ConfigError> {
        let config = AuthConfig {
            backend: self.backend,
            supabase: self.supabase,
            appwrite: self.appwrite,
            polling: self.polling,
            site_url: self.site_url,
        };
        config.validate()?;
        Ok(config)
    }
}

/// On-disk TOML shape
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    backend: BackendKind,
    site_url: Option<String>,
    supabase: SupabaseConfig,
    appwrite: AppwriteConfig,
    polling: FilePolling,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilePolling {
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    fetch_timeout_ms: Option<u64>,
    /// `0` disables the realtime liveness check
    realtime_liveness_ms: Option<u64>,
}

impl FileConfig {
    fn into_builder(self) -> AuthConfigBuilder {
        let defaults = PollSettings::default();
        let millis = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };
        let liveness = match self.polling.realtime_liveness_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.realtime_liveness,
        };
        let polling = PollSettings::new(
            millis(self.polling.base_delay_ms, defaults.base_delay),
            millis(self.polling.max_delay_ms, defaults.max_delay),
        )
        .with_fetch_timeout(millis(self.polling.fetch_timeout_ms, defaults.fetch_timeout))
        .with_realtime_liveness(liveness);

        AuthConfigBuilder {
            backend: self.backend,
            supabase: self.supabase,
            appwrite: self.appwrite,
            polling,
            site_url: self.site_url,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("unknown backend '{0}', expected 'supabase' or 'appwrite'")]
    UnknownBackend(String),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to read configuration: {0}")]
    Io(String),
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", value, e)))
}
