use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use cbox_box::{BoxConfig, ConfigError, ConfigResult, StorageConfig};

use crate::cli::Cli;

/// Simulator settings: the transport, plus the `[box]` section handed to
/// the box itself.
///
/// ```toml
/// bind = "127.0.0.1:8332"
/// tick_ms = 100
///
/// [box]
/// device_id = "sim-01"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub bind: SocketAddr,
    pub tick_ms: u64,
    #[serde(rename = "box")]
    pub cbox: BoxConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8332)),
            tick_ms: 100,
            cbox: BoxConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Config file (or defaults) with command-line overrides applied.
    pub fn from_cli(cli: &Cli) -> ConfigResult<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(bind) = cli.bind {
            config.bind = bind;
        }
        if let Some(tick_ms) = cli.tick_ms {
            config.tick_ms = tick_ms;
        }
        if let Some(path) = &cli.storage {
            config.cbox.storage = StorageConfig::file(path);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms is zero".to_string()));
        }
        self.cbox.validate()
    }
}
