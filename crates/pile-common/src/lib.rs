pub mod duration;
pub mod transport;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use duration::{format_duration, parse_duration, DurationError};
pub use transport::{Family, Transport, TransportError};

pub const DEFAULT_ADDRESS: &str = ":12345";
pub const DEFAULT_WORKERS: usize = 1024;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKLOG: u32 = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Duration(#[from] DurationError),
    #[error("address must not be empty")]
    EmptyAddress,
    #[error("listen backlog must be greater than zero")]
    ZeroBacklog,
}

/// Run configuration shared by the acceptor and the piler.
///
/// Built once at startup, either from defaults, a YAML file, or both with
/// command-line overrides on top. Every field is optional in YAML.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Network transport (`tcp`, `tcp4`, `tcp6`, `udp`, `udp4`, `udp6`, `unix`).
    pub transport: Transport,
    /// Address to listen on and connect to: `host:port`, `:port` or a unix path.
    pub address: String,
    /// Number of piled client connections.
    pub workers: usize,
    /// Hold time before shutdown, also used as the TCP keep-alive period.
    #[serde(deserialize_with = "duration::deserialize")]
    pub duration: Duration,
    /// Listen backlog for stream listeners.
    pub backlog: u32,
    /// Bind the listener. When false the pile targets an external listener.
    pub listen: bool,
    /// Block on stdin before binding.
    pub gate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            address: DEFAULT_ADDRESS.to_string(),
            workers: DEFAULT_WORKERS,
            duration: DEFAULT_DURATION,
            backlog: DEFAULT_BACKLOG,
            listen: true,
            gate: false,
        }
    }
}

impl Config {
    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.backlog == 0 {
            return Err(ConfigError::ZeroBacklog);
        }
        Ok(())
    }
}
