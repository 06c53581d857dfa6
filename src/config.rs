//! Proxy configuration
//!
//! Everything has a default, so the proxy runs with nothing but a port.
//! A YAML file can override any subset of the fields:
//!
//! ```yaml
//! server:
//!   listen_host: 0.0.0.0
//!   max_connections: 1024
//! cache:
//!   capacity: 10
//!   max_object_size: 102400
//!   max_cache_size: 1049000
//!   policy: lru
//! proxy:
//!   connect_timeout_secs: 10
//!   read_timeout_secs: 30
//!   chunk_size: 8192
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Largest response (status line, headers and body) that will be cached.
pub const MAX_OBJECT_SIZE: usize = 102_400;

/// Total bytes the cache may hold across all entries.
pub const MAX_CACHE_SIZE: usize = 1_049_000;

/// Number of entries the cache may hold.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_host: String,
    /// Port to listen on. Normally supplied on the command line.
    pub port: u16,
    /// Upper bound on concurrently served connections, `0` for no bound.
    pub max_connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evict the least recently used entries to make room.
    Lru,
    /// Drop the new entry when the table is full.
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub max_object_size: usize,
    pub max_cache_size: usize,
    pub policy: EvictionPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub connect_timeout_secs: Option<u64>,
    /// Longest idle gap allowed between two reads from the origin.
    pub read_timeout_secs: Option<u64>,
    pub chunk_size: usize,
    /// Sent to the origin when the client did not identify itself.
    pub user_agent: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 1024,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            max_object_size: MAX_OBJECT_SIZE,
            max_cache_size: MAX_CACHE_SIZE,
            policy: EvictionPolicy::Lru,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            read_timeout_secs: Some(30),
            chunk_size: 8192,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }
}

impl Config {
    /// Load the configuration, reading `path` when given and applying
    /// the `LISTEN_HOST` environment override.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        if let Ok(host) = std::env::var("LISTEN_HOST") {
            cfg.server.listen_host = host;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid("cache.capacity must be at least 1".into()));
        }
        if self.cache.max_object_size > self.cache.max_cache_size {
            return Err(ConfigError::Invalid(
                "cache.max_object_size must not exceed cache.max_cache_size".into(),
            ));
        }
        if self.proxy.chunk_size == 0 {
            return Err(ConfigError::Invalid("proxy.chunk_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.listen_host, self.server.port)
    }
}

impl ProxyConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}
