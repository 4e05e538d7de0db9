use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::{Result, SyncError};

/// Sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long a remote call may take before it counts as unreachable
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// REST endpoint root (for the HTTP remote)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_remote_timeout_ms() -> u64 {
    10_000
}

impl SyncConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Load from a JSON file; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| SyncError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout_ms: default_remote_timeout_ms(),
            base_url: None,
            api_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.remote_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::default()
            .with_remote_timeout(Duration::from_millis(250))
            .with_base_url("https://admin.example.test/api")
            .with_api_token("secret");
        assert_eq!(config.remote_timeout_ms, 250);
        assert_eq!(config.base_url.as_deref(), Some("https://admin.example.test/api"));
        assert_eq!(config.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SyncConfig::load("/nonexistent/order-sync.json").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
