use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cbox_blox::SYS_INFO_ID;
use cbox_registry::DEFAULT_USER_START;
use cbox_storage::{FileStorageConfig, DEFAULT_CAPACITY};
use cbox_types::ObjectId;

use crate::error::{ConfigError, ConfigResult};

/// Configuration of one box.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```toml
/// device_id = "sim-01"
/// user_start_id = 100
/// tombstone_deleted = true
///
/// [storage]
/// backend = "file"
/// path = "objects.db"
/// max_bytes = 65536
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoxConfig {
    /// Reported through the SysInfo object.
    pub device_id: String,
    /// First id handed to host-created objects. Lower ids are system ids.
    pub user_start_id: u16,
    /// Leave a tombstone when a host deletes an object, so its id stays
    /// reserved across restarts.
    pub tombstone_deleted: bool,
    pub storage: StorageConfig,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            device_id: "cbox".to_string(),
            user_start_id: DEFAULT_USER_START.raw(),
            tombstone_deleted: true,
            storage: StorageConfig::default(),
        }
    }
}

impl BoxConfig {
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn user_start(&self) -> ObjectId {
        ObjectId::new(self.user_start_id)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let start = self.user_start();
        if start <= SYS_INFO_ID || start.is_reserved() {
            return Err(ConfigError::Invalid(format!(
                "user_start_id {} must be above {} and below {}",
                self.user_start_id,
                SYS_INFO_ID,
                ObjectId::RESERVED_START
            )));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(ConfigError::Invalid(
                "file storage needs a path".to_string(),
            ));
        }
        if self.storage.max_bytes == 0 {
            return Err(ConfigError::Invalid("storage max_bytes is zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile: records are lost when the process exits.
    #[default]
    Memory,
    File,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Record file, required for the file backend.
    pub path: Option<PathBuf>,
    /// Byte budget for stored records.
    pub max_bytes: usize,
    pub sync_every_write: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            max_bytes: DEFAULT_CAPACITY,
            sync_every_write: false,
        }
    }
}

impl StorageConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::File,
            path: Some(path.into()),
            max_bytes: FileStorageConfig::default().max_bytes,
            sync_every_write: false,
        }
    }

    pub fn file_config(&self) -> FileStorageConfig {
        FileStorageConfig {
            max_bytes: self.max_bytes,
            sync_every_write: self.sync_every_write,
        }
    }
}
