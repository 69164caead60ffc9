//! Router configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};
use crate::pool::PoolConfig;

/// Default number of attempts per call.
pub const DEFAULT_MAX_TTL: u32 = 5;

/// Settings for [`crate::Router`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Comma-separated `host:port` seed list.
    pub seeds: String,
    /// Defer the first topology load to the first call.
    pub lazy: bool,
    /// Maximum attempts per call.
    pub max_ttl: u32,
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Idle connections kept per node (`None` = unbounded).
    pub max_idle_per_node: Option<usize>,
    /// Route to a random known node when the slot owner is unknown or unreachable.
    pub random_fallback: bool,
    /// With `lazy = false`, fail setup if no node answers the topology query.
    pub require_topology: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            seeds: String::new(),
            lazy: true,
            max_ttl: DEFAULT_MAX_TTL,
            connect_timeout_ms: None,
            max_idle_per_node: None,
            random_fallback: true,
            require_topology: true,
        }
    }
}

impl RouterConfig {
    /// Config with the given seeds and defaults otherwise.
    pub fn with_seeds(seeds: impl Into<String>) -> Self {
        Self {
            seeds: seeds.into(),
            ..Self::default()
        }
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: RouterConfig =
            toml::from_str(input).map_err(|e| RouterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the router cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_ttl == 0 {
            return Err(RouterError::Config("max_ttl must be at least 1".to_string()));
        }
        if self.max_idle_per_node == Some(0) {
            return Err(RouterError::Config(
                "max_idle_per_node must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Pool settings derived from this config.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            max_idle: self.max_idle_per_node,
        }
    }
}
