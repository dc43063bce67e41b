//! HTTP store configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HttpConfigError;

/// Endpoint used when `ENVIRONMENT=local-db` and no explicit endpoint is set.
pub const LOCAL_DB_ENDPOINT: &str = "http://localhost:8000";

/// Configuration for [`crate::HttpStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpStoreConfig {
    /// Base URL of the store endpoint, e.g. `http://localhost:8000`.
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Access key id placed in the credential scope sent to local emulators.
    #[serde(default = "default_access_key")]
    pub access_key_id: String,
}

fn default_region() -> String {
    "us-east-1".into()
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_access_key() -> String {
    "local".into()
}

impl HttpStoreConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: default_region(),
            request_timeout_ms: default_timeout_ms(),
            access_key_id: default_access_key(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Build from the process environment.
    ///
    /// Reads `DYNABATCH_ENDPOINT`, `ENVIRONMENT` (`local-db` selects
    /// [`LOCAL_DB_ENDPOINT`]), `AWS_REGION` and `AWS_ACCESS_KEY_ID`.
    pub fn from_env() -> Result<Self, HttpConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HttpConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = match lookup("DYNABATCH_ENDPOINT").filter(|s| !s.is_empty()) {
            Some(url) => url,
            None if lookup("ENVIRONMENT").as_deref() == Some("local-db") => LOCAL_DB_ENDPOINT.into(),
            None => return Err(HttpConfigError::MissingEndpoint),
        };
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(HttpConfigError::InvalidEndpoint(endpoint));
        }

        let mut config = Self::new(endpoint);
        if let Some(region) = lookup("AWS_REGION").filter(|s| !s.is_empty()) {
            config.region = region;
        }
        if let Some(key) = lookup("AWS_ACCESS_KEY_ID").filter(|s| !s.is_empty()) {
            config.access_key_id = key;
        }
        Ok(config)
    }
}
