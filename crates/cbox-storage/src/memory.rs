use std::collections::BTreeMap;

use tracing::debug;

use cbox_types::{ObjectId, TypeId};

use crate::error::{StorageError, StorageResult};
use crate::record::StoredRecord;
use crate::traits::ObjectStorage;

/// Budget used by [`InMemoryObjectStorage::new`].
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Record store held in memory, with a byte budget like a real medium.
///
/// Intended for tests and for running a box without durable storage.
/// Records are cloned on read and write.
#[derive(Debug, Clone)]
pub struct InMemoryObjectStorage {
    records: BTreeMap<ObjectId, StoredRecord>,
    capacity: usize,
    used: usize,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            capacity,
            used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStorage for InMemoryObjectStorage {
    fn store(&mut self, record: &StoredRecord) -> StorageResult<()> {
        // encoding validates the payload length
        let size = record.to_bytes()?.len();
        let replaced = self
            .records
            .get(&record.id)
            .map_or(0, StoredRecord::encoded_len);
        let available = self.capacity - (self.used - replaced);
        if size > available {
            debug!(id = %record.id, size, available, "record does not fit");
            return Err(StorageError::Full {
                needed: size,
                available,
            });
        }
        self.used = self.used - replaced + size;
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn retrieve(&self, id: ObjectId) -> StorageResult<Option<StoredRecord>> {
        Ok(self.records.get(&id).cloned())
    }

    fn retrieve_all(&self) -> StorageResult<Vec<StoredRecord>> {
        Ok(self.records.values().cloned().collect())
    }

    fn dispose(&mut self, id: ObjectId) -> StorageResult<bool> {
        match self.records.remove(&id) {
            Some(old) => {
                self.used -= old.encoded_len();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.records.clear();
        self.used = 0;
        Ok(())
    }

    fn used_bytes(&self) -> usize {
        self.used
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn list(&self) -> StorageResult<Vec<(ObjectId, TypeId)>> {
        Ok(self.records.values().map(|r| (r.id, r.type_id)).collect())
    }
}
