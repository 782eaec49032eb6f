//! Adapter configuration.
//!
//! `AdapterConfig` deserializes with defaults for every field, so a partial
//! document (or none at all) is valid. `from_env` reads the same settings
//! from `ADAPTER_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};

pub const BASE_URL_VAR: &str = "ADAPTER_BASE_URL";
pub const TIMEOUT_SECS_VAR: &str = "ADAPTER_TIMEOUT_SECS";
pub const USER_AGENT_VAR: &str = "ADAPTER_USER_AGENT";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("adapter-core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Substituted for `{+baseurl}` in every request template.
    pub base_url: String,
    /// Whole-exchange timeout of the default transport; `0` disables it.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AdapterConfig {
    /// Defaults overridden by whichever `ADAPTER_*` variables are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_VAR) {
            config.base_url = base_url;
        }
        if let Some(raw) = lookup(TIMEOUT_SECS_VAR) {
            config.timeout_secs = raw.trim().parse().map_err(|e| {
                AdapterError::InvalidArgument(format!("{TIMEOUT_SECS_VAR}={raw:?}: {e}"))
            })?;
        }
        if let Some(user_agent) = lookup(USER_AGENT_VAR).filter(|ua| !ua.trim().is_empty()) {
            config.user_agent = user_agent;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// The ureq transport these settings describe.
    #[cfg(feature = "ureq")]
    pub fn transport(&self) -> crate::transport::UreqTransport {
        crate::transport::UreqTransport::with_settings(self.timeout(), Some(self.user_agent.as_str()))
    }
}
