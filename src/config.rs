//! CatalogConfig - serde-loadable settings for every catalog component.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Durations are whole milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::federation::{FederationConfig, FederationMode};
use crate::update::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FederationSettings {
    pub mode: FederationMode,
    pub deadline_ms: u64,
    pub max_concurrency: Option<usize>,
}

impl Default for FederationSettings {
    fn default() -> Self {
        let defaults = FederationConfig::default();
        FederationSettings {
            mode: defaults.mode,
            deadline_ms: defaults.deadline.as_millis() as u64,
            max_concurrency: defaults.max_concurrency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub ttl_ms: u64,
    pub max_entries: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl_ms: 60_000,
            max_entries: Some(1_024),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    pub deadline_ms: Option<u64>,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        UpdateSettings {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            jitter: defaults.jitter,
            deadline_ms: None,
        }
    }
}

/// Top-level catalog configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub federation: FederationSettings,
    pub cache: CacheSettings,
    pub update: UpdateSettings,
}

impl CatalogConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: CatalogConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.federation.deadline_ms == 0 {
            return Err(ConfigError::Invalid("federation.deadline_ms must be positive".into()));
        }
        if self.federation.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "federation.max_concurrency must be positive".into(),
            ));
        }
        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::Invalid("cache.max_entries must be positive".into()));
        }
        if self.update.max_attempts == 0 {
            return Err(ConfigError::Invalid("update.max_attempts must be at least 1".into()));
        }
        if self.update.base_delay_ms > self.update.max_delay_ms {
            return Err(ConfigError::Invalid(
                "update.base_delay_ms exceeds update.max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn federation_config(&self) -> FederationConfig {
        FederationConfig {
            mode: self.federation.mode,
            deadline: Duration::from_millis(self.federation.deadline_ms),
            max_concurrency: self.federation.max_concurrency,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.update.max_attempts,
            base_delay: Duration::from_millis(self.update.base_delay_ms),
            max_delay: Duration::from_millis(self.update.max_delay_ms),
            jitter: self.update.jitter,
            deadline: self.update.deadline_ms.map(Duration::from_millis),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }
}
