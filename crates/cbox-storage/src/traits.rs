use cbox_types::{ObjectId, TypeId};

use crate::error::StorageResult;
use crate::record::StoredRecord;

/// Keyed store of persisted object records.
///
/// All implementations must satisfy these invariants:
/// - At most one record per object id is visible. Storing a record for an
///   id replaces the previous one as a whole.
/// - A record is either returned intact (CRC verified) or not at all.
/// - A failed `store` leaves the previously stored record for that id in
///   place.
/// - The byte budget covers whole encoded records, headers included.
pub trait ObjectStorage {
    /// Write `record`, replacing any earlier record with the same id.
    fn store(&mut self, record: &StoredRecord) -> StorageResult<()>;

    /// Read the record for `id`.
    ///
    /// Returns `Ok(None)` if nothing is stored for `id`.
    fn retrieve(&self, id: ObjectId) -> StorageResult<Option<StoredRecord>>;

    /// Every stored record in ascending id order.
    fn retrieve_all(&self) -> StorageResult<Vec<StoredRecord>>;

    /// Remove the record for `id`. Returns `true` if one existed.
    fn dispose(&mut self, id: ObjectId) -> StorageResult<bool>;

    /// Remove every record.
    fn clear(&mut self) -> StorageResult<()>;

    /// Bytes taken by live records.
    fn used_bytes(&self) -> usize;

    /// Total byte budget.
    fn capacity(&self) -> usize;

    /// `(id, type)` of every stored record.
    ///
    /// Default implementation reads all records. Backends that keep an index
    /// may override it.
    fn list(&self) -> StorageResult<Vec<(ObjectId, TypeId)>> {
        Ok(self
            .retrieve_all()?
            .into_iter()
            .map(|r| (r.id, r.type_id))
            .collect())
    }
}
