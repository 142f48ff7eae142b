//! Client configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base URL of the service (e.g. `https://graph.microsoft.com`).
    pub api_base_url: String,
    /// API version segment appended to the base URL.
    pub api_version: String,
    /// Tenant the caller is signed into.
    pub tenant: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// How many times a throttled (429) request is retried.
    pub max_retries: u32,
    /// `$top` sent with listing requests; `None` leaves it to the server.
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://graph.microsoft.com".to_string(),
            api_version: "v1.0".to_string(),
            tenant: "common".to_string(),
            timeout_secs: 60,
            max_retries: 10,
            page_size: None,
        }
    }
}

impl GraphConfig {
    /// Root that relative request paths are joined onto.
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}
