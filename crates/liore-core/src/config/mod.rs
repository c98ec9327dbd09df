//! Store configuration.
//!
//! A JSON file provides the Firebase project and sync tuning; `LIORE_*`
//! environment variables override individual values. The Firebase block
//! accepts the web SDK's camelCase keys so the snippet from the Firebase
//! console can be pasted as-is.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_KEY;
use crate::util::normalize_text_option;
use crate::{Error, Result};

pub const DEFAULT_COLLECTION: &str = "storyOwners";
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE_ID: &str = "(default)";

const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const ENV_API_KEY: &str = "LIORE_FIREBASE_API_KEY";
const ENV_PROJECT_ID: &str = "LIORE_FIREBASE_PROJECT_ID";
const ENV_DATABASE_ID: &str = "LIORE_FIREBASE_DATABASE_ID";
const ENV_BASE_URL: &str = "LIORE_FIREBASE_BASE_URL";
const ENV_AUTH_TOKEN: &str = "LIORE_FIREBASE_AUTH_TOKEN";
const ENV_COLLECTION: &str = "LIORE_COLLECTION";
const ENV_CACHE_KEY: &str = "LIORE_CACHE_KEY";
const ENV_POLL_INTERVAL_MS: &str = "LIORE_POLL_INTERVAL_MS";

/// Firebase project settings.
///
/// Unknown keys (`authDomain`, `appId`, ...) are ignored.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirebaseConfig {
    #[serde(default, alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, alias = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, alias = "databaseId", skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
    /// Override for the REST endpoint, e.g. a local emulator
    #[serde(default, alias = "baseUrl", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Optional bearer token (Firebase ID token) for locked-down rules
    #[serde(default, alias = "authToken", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FirebaseConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl FirebaseConfig {
    pub fn is_configured(&self) -> bool {
        normalize_text_option(self.project_id.clone()).is_some()
    }

    pub fn database_id(&self) -> String {
        normalize_text_option(self.database_id.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_ID.to_string())
    }

    pub fn base_url(&self) -> String {
        normalize_text_option(self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_FIRESTORE_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Everything needed to build a `SyncStore` against Firestore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    /// How often the change feed polls the collection
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            firebase: FirebaseConfig::default(),
            collection: default_collection(),
            cache_key: default_cache_key(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Parse configuration from a JSON payload
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read config at {}: {error}", path.display()))
        })?;
        Self::from_json(&raw).map_err(|error| match error {
            Error::Config(message) => Error::Config(format!("{message} ({})", path.display())),
            other => other,
        })
    }

    /// Write configuration to `path`, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Overlay `LIORE_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`, keyed by `LIORE_*` variable name.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(value) = read(ENV_API_KEY) {
            self.firebase.api_key = Some(value);
        }
        if let Some(value) = read(ENV_PROJECT_ID) {
            self.firebase.project_id = Some(value);
        }
        if let Some(value) = read(ENV_DATABASE_ID) {
            self.firebase.database_id = Some(value);
        }
        if let Some(value) = read(ENV_BASE_URL) {
            self.firebase.base_url = Some(value);
        }
        if let Some(value) = read(ENV_AUTH_TOKEN) {
            self.firebase.auth_token = Some(value);
        }
        if let Some(value) = read(ENV_COLLECTION) {
            self.collection = value;
        }
        if let Some(value) = read(ENV_CACHE_KEY) {
            self.cache_key = value;
        }
        if let Some(value) = read(ENV_POLL_INTERVAL_MS) {
            match value.parse() {
                Ok(interval) if interval > 0 => self.poll_interval_ms = interval,
                _ => tracing::warn!("Ignoring invalid {ENV_POLL_INTERVAL_MS}: {value}"),
            }
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.firebase.api_key = normalize_text_option(self.firebase.api_key.take());
        self.firebase.project_id = normalize_text_option(self.firebase.project_id.take());
        self.firebase.database_id = normalize_text_option(self.firebase.database_id.take());
        self.firebase.base_url = normalize_text_option(self.firebase.base_url.take());
        self.firebase.auth_token = normalize_text_option(self.firebase.auth_token.take());
        self.collection = normalize_text_option(Some(std::mem::take(&mut self.collection)))
            .unwrap_or_else(default_collection);
        self.cache_key = normalize_text_option(Some(std::mem::take(&mut self.cache_key)))
            .unwrap_or_else(default_cache_key);
    }

    /// Reject timing values the change feed and HTTP client cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.timing_problem().map_or(Ok(()), |problem| Err(Error::Config(problem)))
    }

    pub(crate) fn timing_problem(&self) -> Option<String> {
        if self.poll_interval_ms == 0 {
            return Some("poll_interval_ms must be greater than zero".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Some("request_timeout_secs must be greater than zero".to_string());
        }
        None
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
