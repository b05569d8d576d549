//! Router configuration file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cdnroute_core::GeoPoint;
use serde::Deserialize;

use crate::error::ConfigError;

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_topology_interval_ms() -> u64 {
    60_000
}

fn default_health_interval_ms() -> u64 {
    1_000
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_user_agent() -> String {
    concat!("cdnroute/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Everything the router needs to start.
///
/// Loaded from a JSON file; see the field docs for defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP listener binds. Defaults to `0.0.0.0:8080`.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// File paths or URLs of the topology document, rotated round robin.
    pub topology_sources: Vec<String>,

    /// File paths or URLs of the health document, rotated round robin.
    pub health_sources: Vec<String>,

    /// Topology poll interval. Defaults to one minute.
    #[serde(default = "default_topology_interval_ms")]
    pub topology_poll_interval_ms: u64,

    /// Health poll interval. Defaults to one second.
    #[serde(default = "default_health_interval_ms")]
    pub health_poll_interval_ms: u64,

    /// Timeout of each HTTP fetch. Defaults to five seconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// User-Agent sent on HTTP fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Coverage zone file.
    pub coverage_zone_path: PathBuf,

    /// Position used for clients the coverage zones do not cover.
    pub default_position: GeoPoint,
}

impl Config {
    /// Decode and check a configuration.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, decode and check a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.topology_sources.is_empty() {
            return Err(ConfigError::NoSources("topology_sources"));
        }
        if self.health_sources.is_empty() {
            return Err(ConfigError::NoSources("health_sources"));
        }
        for (name, value) in [
            ("topology_poll_interval_ms", self.topology_poll_interval_ms),
            ("health_poll_interval_ms", self.health_poll_interval_ms),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }

    /// Topology poll interval.
    pub fn topology_poll_interval(&self) -> Duration {
        Duration::from_millis(self.topology_poll_interval_ms)
    }

    /// Health poll interval.
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    /// HTTP fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
