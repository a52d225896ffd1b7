use tracing::{info, warn};

use cbox_blox::{ConnectivityHandle, SysInfoBlock, SYS_INFO_ID};
use cbox_object::ObjectFactory;
use cbox_registry::Container;
use cbox_storage::{FileObjectStorage, InMemoryObjectStorage, ObjectStorage};
use cbox_types::{Ticks, UpdateTime};

use crate::config::{BoxConfig, StorageBackend};
use crate::error::{BoxResult, ConfigError};
use crate::persistence::{LoadReport, PersistenceManager};
use crate::processor::{ProcessorState, ProcessorStats};

/// One box: the object container, the persistence manager behind it, and
/// the command processor in front of it.
///
/// A `Controlbox` is an ordinary owned value. Commands and update passes
/// both take `&mut self`, so one always runs to completion before the
/// other starts.
pub struct Controlbox {
    pub(crate) config: BoxConfig,
    pub(crate) objects: Container,
    pub(crate) factory: ObjectFactory,
    pub(crate) persistence: PersistenceManager,
    pub(crate) connectivity: ConnectivityHandle,
    pub(crate) state: ProcessorState,
    pub(crate) stats: ProcessorStats,
}

impl Controlbox {
    /// Open the storage named in `config` and boot from it.
    pub fn open(config: BoxConfig) -> BoxResult<(Self, LoadReport)> {
        config.validate()?;
        let storage: Box<dyn ObjectStorage> = match config.storage.backend {
            StorageBackend::Memory => {
                Box::new(InMemoryObjectStorage::with_capacity(config.storage.max_bytes))
            }
            StorageBackend::File => {
                let path = config.storage.path.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("file storage needs a path".to_string())
                })?;
                Box::new(FileObjectStorage::open(path, config.storage.file_config())?)
            }
        };
        Self::boot(config, storage)
    }

    /// Boot a box on top of `storage`: install the system objects, then
    /// restore every persisted object at its stored id.
    pub fn boot(
        config: BoxConfig,
        storage: Box<dyn ObjectStorage>,
    ) -> BoxResult<(Self, LoadReport)> {
        config.validate()?;
        let connectivity = ConnectivityHandle::new();
        let mut objects = Container::new(config.user_start());
        objects.add_system(
            SYS_INFO_ID,
            Box::new(SysInfoBlock::new(
                config.device_id.clone(),
                connectivity.clone(),
            )),
        )?;

        let factory = cbox_blox::factory();
        let persistence = PersistenceManager::new(storage);
        let report = persistence.load_all(&mut objects, &factory)?;
        if !report.skipped.is_empty() {
            warn!(skipped = ?report.skipped, "some stored records were not restored");
        }
        info!(
            device = %config.device_id,
            objects = objects.len(),
            user_start = %config.user_start(),
            "box booted"
        );

        let cbox = Self {
            config,
            objects,
            factory,
            persistence,
            connectivity,
            state: ProcessorState::AwaitingFrame,
            stats: ProcessorStats::default(),
        };
        Ok((cbox, report))
    }

    /// Tear the box down, keeping only its storage. Booting again from the
    /// returned storage is a reboot.
    pub fn shutdown(self) -> Box<dyn ObjectStorage> {
        info!(device = %self.config.device_id, "box shut down");
        self.persistence.into_storage()
    }

    /// Run one update pass. Returns when the box next needs servicing.
    pub fn update(&mut self, now: Ticks) -> UpdateTime {
        self.objects.update_all(now)
    }

    pub fn config(&self) -> &BoxConfig {
        &self.config
    }

    pub fn objects(&self) -> &Container {
        &self.objects
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// Handle the transport uses to report link state.
    pub fn connectivity(&self) -> ConnectivityHandle {
        self.connectivity.clone()
    }

    /// Add block types on top of the built-in ones.
    pub fn factory_mut(&mut self) -> &mut ObjectFactory {
        &mut self.factory
    }
}

impl std::fmt::Debug for Controlbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controlbox")
            .field("device_id", &self.config.device_id)
            .field("objects", &self.objects.len())
            .field("persistence", &self.persistence)
            .field("state", &self.state)
            .finish()
    }
}
