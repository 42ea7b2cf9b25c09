// SPDX-License-Identifier: PMPL-1.0-or-later
//! Server configuration.
//!
//! Defaults are overridable from `ROLEGATE_*` environment variables.
//! Unparseable values are logged and ignored.

use serde::{Deserialize, Serialize};
use tracing::warn;

use rolegate_authz::history::DEFAULT_MAX_PAGE_SIZE;

pub const ENV_HOST: &str = "ROLEGATE_HOST";
pub const ENV_PORT: &str = "ROLEGATE_PORT";
pub const ENV_IDENTITY_HEADER: &str = "ROLEGATE_IDENTITY_HEADER";
pub const ENV_MAX_HISTORY_PAGE_SIZE: &str = "ROLEGATE_MAX_HISTORY_PAGE_SIZE";
pub const ENV_BOOTSTRAP_MODERATORS: &str = "ROLEGATE_BOOTSTRAP_MODERATORS";

/// API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Trusted header carrying the caller's user id
    pub identity_header: String,
    pub max_history_page_size: u32,
    /// Users granted the global moderator role at startup
    #[serde(default)]
    pub bootstrap_moderators: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            identity_header: "x-user-id".to_string(),
            max_history_page_size: DEFAULT_MAX_PAGE_SIZE,
            bootstrap_moderators: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = var(ENV_HOST) {
            config.host = host;
        }

        if let Some(raw) = var(ENV_PORT) {
            match raw.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {}", ENV_PORT),
            }
        }

        if let Some(header) = var(ENV_IDENTITY_HEADER) {
            match axum::http::HeaderName::from_bytes(header.as_bytes()) {
                Ok(name) => config.identity_header = name.as_str().to_string(),
                Err(e) => warn!(value = %header, error = %e, "Ignoring invalid {}", ENV_IDENTITY_HEADER),
            }
        }

        if let Some(raw) = var(ENV_MAX_HISTORY_PAGE_SIZE) {
            match raw.parse::<u32>() {
                Ok(size) if size > 0 => config.max_history_page_size = size,
                Ok(_) => warn!(value = %raw, "Ignoring zero {}", ENV_MAX_HISTORY_PAGE_SIZE),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Ignoring invalid {}", ENV_MAX_HISTORY_PAGE_SIZE)
                }
            }
        }

        if let Some(raw) = var(ENV_BOOTSTRAP_MODERATORS) {
            for entry in raw.split(',') {
                let user = entry.trim();
                if user.is_empty() {
                    warn!(entry = %entry, "Skipping empty bootstrap moderator entry");
                    continue;
                }
                if !config.bootstrap_moderators.iter().any(|u| u == user) {
                    config.bootstrap_moderators.push(user.to_string());
                }
            }
        }

        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
