//! Bridge between live objects and the record storage.
//!
//! Objects are persisted whole: every change rewrites the object's record
//! with the current output of `stream_persisted_to`. At boot every record is
//! turned back into an object at its stored id.

use tracing::{debug, info, warn};

use cbox_codec::{BlackholeDataOut, DataIn, DataOut};
use cbox_object::{Object, ObjectFactory, Tombstone};
use cbox_registry::Container;
use cbox_storage::{ObjectStorage, StorageError, StoredRecord, MAX_PAYLOAD};
use cbox_types::{CboxError, CboxResult, ObjectId, TypeId};

/// What a boot load did with the stored records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Objects restored from their stored payload.
    pub restored: Vec<ObjectId>,
    /// Ids restored as tombstones: deleted objects and types no longer known.
    pub tombstoned: Vec<ObjectId>,
    /// Objects whose payload failed to decode and were default-constructed.
    pub defaulted: Vec<ObjectId>,
    /// Records that could not be placed at all.
    pub skipped: Vec<ObjectId>,
}

impl LoadReport {
    pub fn total(&self) -> usize {
        self.restored.len() + self.tombstoned.len() + self.defaulted.len()
    }
}

pub struct PersistenceManager {
    storage: Box<dyn ObjectStorage>,
}

impl PersistenceManager {
    pub fn new(storage: Box<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    /// Give the storage back, for a later reboot.
    pub fn into_storage(self) -> Box<dyn ObjectStorage> {
        self.storage
    }

    /// Write the persisted state of `object` under `id`.
    ///
    /// An object that needs no persisting has any old record disposed. The
    /// payload is sized with a dry run first, so an object whose state can't
    /// fit a record never touches storage.
    pub fn store(&mut self, id: ObjectId, object: &dyn Object) -> CboxResult<()> {
        if object.block_type() == TypeId::TOMBSTONE {
            return self.store_tombstone(id);
        }

        let mut sizer = BlackholeDataOut::new();
        match object.stream_persisted_to(&mut sizer) {
            Ok(()) => {}
            Err(CboxError::PersistingNotNeeded) => {
                debug!(id = %id, "object not persisted");
                self.dispose(id)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        let size = sizer.written();
        if size > MAX_PAYLOAD {
            warn!(id = %id, size, "persisted state does not fit a record");
            return Err(CboxError::PersistedStorageFull);
        }

        let mut payload = Vec::with_capacity(size);
        object.stream_persisted_to(&mut payload)?;
        let record = StoredRecord::new(id, object.block_type(), payload);
        self.storage.store(&record).map_err(|e| {
            warn!(id = %id, error = %e, "failed to persist object");
            CboxError::from(e)
        })
    }

    /// Keep `id` reserved across restarts without any object state.
    pub fn store_tombstone(&mut self, id: ObjectId) -> CboxResult<()> {
        self.storage
            .store(&StoredRecord::tombstone(id))
            .map_err(CboxError::from)
    }

    /// Drop the record for `id`. Returns `true` if one existed.
    pub fn dispose(&mut self, id: ObjectId) -> CboxResult<bool> {
        self.storage.dispose(id).map_err(CboxError::from)
    }

    pub fn clear(&mut self) -> CboxResult<()> {
        self.storage.clear().map_err(CboxError::from)
    }

    pub fn retrieve(&self, id: ObjectId) -> CboxResult<StoredRecord> {
        self.storage
            .retrieve(id)
            .map_err(CboxError::from)?
            .ok_or(CboxError::PersistedObjectNotFound)
    }

    pub fn list(&self) -> CboxResult<Vec<(ObjectId, TypeId)>> {
        self.storage.list().map_err(CboxError::from)
    }

    /// Recreate every stored object in `container`.
    ///
    /// A record never aborts the load: unknown or tombstoned types come back
    /// as tombstones, undecodable payloads as default objects, and records
    /// that can't be inserted (system ids, duplicates) are skipped.
    pub fn load_all(
        &self,
        container: &mut Container,
        factory: &ObjectFactory,
    ) -> Result<LoadReport, StorageError> {
        let mut report = LoadReport::default();
        for record in self.storage.retrieve_all()? {
            let id = record.id;
            if container.is_system(id) {
                warn!(id = %id, "stored record at a system id ignored");
                report.skipped.push(id);
                continue;
            }

            let (object, outcome): (Box<dyn Object>, &mut Vec<ObjectId>) =
                if record.is_tombstone() || !factory.knows(record.type_id) {
                    if !record.is_tombstone() {
                        info!(id = %id, type_id = %record.type_id, "stored type no longer supported");
                    }
                    let tombstone: Box<dyn Object> = Box::new(Tombstone::new(id));
                    (tombstone, &mut report.tombstoned)
                } else {
                    match restore(factory, &record) {
                        Ok(object) => (object, &mut report.restored),
                        Err(e) => {
                            warn!(id = %id, type_id = %record.type_id, error = %e, "stored payload rejected; using defaults");
                            match factory.make(record.type_id) {
                                Ok(object) => (object, &mut report.defaulted),
                                Err(_) => {
                                    report.skipped.push(id);
                                    continue;
                                }
                            }
                        }
                    }
                };

            match container.insert_with_id(id, object) {
                Ok(()) => outcome.push(id),
                Err(e) => {
                    warn!(id = %id, error = %e, "stored object could not be placed");
                    report.skipped.push(id);
                }
            }
        }
        info!(
            restored = report.restored.len(),
            tombstoned = report.tombstoned.len(),
            defaulted = report.defaulted.len(),
            skipped = report.skipped.len(),
            "persisted objects loaded"
        );
        Ok(report)
    }
}

fn restore(factory: &ObjectFactory, record: &StoredRecord) -> CboxResult<Box<dyn Object>> {
    let mut object = factory.make(record.type_id)?;
    let mut input = DataIn::new(&record.payload);
    object.stream_from(&mut input)?;
    input.expect_end()?;
    Ok(object)
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("used_bytes", &self.storage.used_bytes())
            .field("capacity", &self.storage.capacity())
            .finish()
    }
}
