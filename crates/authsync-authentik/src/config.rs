//! Connection settings for the authentik API

use serde::{Deserialize, Serialize};

use authsync_core::{AuthSyncError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthentikConfig {
    /// Base URL of the authentik instance, e.g. `https://auth.example.com`
    pub base_url: String,
    /// API token, sent as a bearer token
    #[serde(skip_serializing)]
    pub token: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Page size used when walking list endpoints
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

impl AuthentikConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AuthSyncError::config_error(format!(
                "authentik base URL must be http(s): '{}'",
                self.base_url
            )));
        }
        if self.token.is_empty() {
            return Err(AuthSyncError::config_error("authentik token is empty"));
        }
        if self.page_size == 0 {
            return Err(AuthSyncError::config_error("page size must be positive"));
        }
        Ok(())
    }

    /// Root of the v3 API, without a trailing slash
    pub fn api_base(&self) -> String {
        format!("{}/api/v3", self.base_url.trim_end_matches('/'))
    }
}
