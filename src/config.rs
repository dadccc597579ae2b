//! Configuration file and port map parsing
//!
//! ```toml
//! backend = "simulated"          # or "gpio"
//! ports = ["0,1,2,0,0,0"]        # <port>,<pad1>,..,<pad5>; up to three maps
//!
//! [poll]
//! refresh_interval_ms = 10
//! settle_delay_us = 15
//!
//! [[gpio]]
//! port = 0
//! data = [2, 3, 4, 17, 27, 22, 10, 9]
//! control = [11, 5, 6, 13]
//! status = [19, 26, 16, 20, 21]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::port::gpio::GpioPortConfig;

/// Port maps accepted at once (`map`, `map2`, `map3`).
pub const MAX_PORTS: usize = 3;
pub const CONFIG_DIR: &str = "arcadeport";
pub const CONFIG_FILE: &str = "config.toml";
/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "ARCADEPORT_CONFIG";
/// Longest settle delay accepted. The delay blocks the poll task once per
/// read cycle.
pub const MAX_SETTLE_DELAY_US: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Control type {0} unknown")]
    UnknownControlType(i32),

    #[error("No valid devices specified")]
    NoDevices,

    #[error("At least one device must be specified for port {0}")]
    MissingDevices(i32),

    #[error("At most {max} devices per port, got {count}")]
    TooManyDevices { count: usize, max: usize },

    #[error("At most {max} port maps supported, got {count}")]
    TooManyPorts { count: usize, max: usize },

    #[error("Port {0} configured twice")]
    DuplicatePort(u32),

    #[error("Refresh interval must be at least 1 ms")]
    ZeroRefreshInterval,

    #[error("Settle delay of {value} us exceeds the maximum of {max} us")]
    SettleDelayTooLong { value: u64, max: u64 },

    #[error("Invalid port map '{input}': {reason}")]
    InvalidMap { input: String, reason: String },

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Simulated,
    Gpio,
}

/// Poll timing
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PollSettings {
    /// Tick period in milliseconds
    pub refresh_interval_ms: u64,
    /// Settle time before each read cycle in microseconds
    pub settle_delay_us: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 10, // 1/100 s
            settle_delay_us: 15,
        }
    }
}

impl PollSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_micros(self.settle_delay_us)
    }

    /// Rejects timings the poll task cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        if self.settle_delay_us > MAX_SETTLE_DELAY_US {
            return Err(ConfigError::SettleDelayTooLong {
                value: self.settle_delay_us,
                max: MAX_SETTLE_DELAY_US,
            });
        }
        Ok(())
    }
}

/// One port and its connector codes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortMap {
    pub port: u32,
    pub pads: Vec<i32>,
}

impl PortMap {
    /// Parses `"<port>,<pad1>,..."`.
    ///
    /// Returns `Ok(None)` for an empty string or a negative port number,
    /// which leave the slot unused.
    pub fn parse(input: &str) -> Result<Option<Self>, ConfigError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let values = trimmed
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<i32>()
                    .map_err(|e| ConfigError::InvalidMap {
                        input: input.to_string(),
                        reason: format!("'{}': {}", part.trim(), e),
                    })
            })
            .collect::<Result<Vec<i32>, ConfigError>>()?;

        let (&port, pads) = match values.split_first() {
            Some(split) => split,
            None => return Ok(None),
        };
        if port < 0 {
            debug!("Port map '{}' disabled", input);
            return Ok(None);
        }
        if pads.is_empty() {
            return Err(ConfigError::MissingDevices(port));
        }

        Ok(Some(Self {
            port: port as u32,
            pads: pads.to_vec(),
        }))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub ports: Vec<String>,
    pub poll: PollSettings,
    pub gpio: Vec<GpioPortConfig>,
}

impl Config {
    /// Configuration written on first start: Arcade + Key1 on port 0.
    pub fn default_config() -> Self {
        Self {
            ports: vec!["0,1,2".to_string()],
            gpio: vec![GpioPortConfig::default()],
            ..Default::default()
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.poll.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Active port maps, in configuration order.
    pub fn port_maps(&self) -> Result<Vec<PortMap>, ConfigError> {
        if self.ports.len() > MAX_PORTS {
            return Err(ConfigError::TooManyPorts {
                count: self.ports.len(),
                max: MAX_PORTS,
            });
        }

        let mut maps = Vec::new();
        for entry in &self.ports {
            if let Some(map) = PortMap::parse(entry)? {
                maps.push(map);
            }
        }
        Ok(maps)
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::parse(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(path, self.to_toml()?)
            .await
            .map_err(io_error)?;
        Ok(())
    }

    /// Writes [`Config::default_config`] to `path` unless a file exists.
    pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !exists {
            info!("Creating default configuration at {}", path.display());
            Self::default_config().save(path).await?;
        }
        Ok(())
    }
}
