use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use cbox_codec::split_crc;
use cbox_types::{ObjectId, TypeId};

use crate::error::{StorageError, StorageResult};
use crate::record::{RecordHeader, StoredRecord};
use crate::traits::ObjectStorage;

/// Configuration for [`FileObjectStorage`].
#[derive(Clone, Debug)]
pub struct FileStorageConfig {
    /// Upper bound on the record file size in bytes (default: 64 KiB).
    pub max_bytes: usize,
    /// `fsync` after every write.
    pub sync_every_write: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024,
            sync_every_write: false,
        }
    }
}

/// Where the live copy of a record sits in the file.
#[derive(Clone, Copy, Debug)]
struct Slot {
    offset: u64,
    type_id: TypeId,
    len: usize,
}

/// Records kept in a single append-or-rewrite file.
///
/// A new version of a record is appended first and the old version is then
/// disposed by zeroing its id field in place, so a crash in between leaves
/// two intact copies and the later one wins on the next open. When the file
/// would outgrow its budget the live records are copied to a temporary file
/// that then replaces the original.
///
/// On open the file is scanned front to back. A record failing the CRC check,
/// or whose length runs past the end of the file, is skipped and the scan
/// resumes at the next intact record. Only when no intact record follows is
/// it a torn write, and the tail is cut off.
pub struct FileObjectStorage {
    path: PathBuf,
    file: File,
    index: BTreeMap<ObjectId, Slot>,
    /// Append position.
    end: u64,
    config: FileStorageConfig,
}

impl FileObjectStorage {
    /// Open (or create) the record file at `path`.
    pub fn open(path: &Path, config: FileStorageConfig) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let mut storage = Self {
            path: path.to_path_buf(),
            file,
            index: BTreeMap::new(),
            end: 0,
            config,
        };
        storage.scan()?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length, disposed records included.
    pub fn file_len(&self) -> u64 {
        self.end
    }

    /// Rewrite the file with only the live records.
    pub fn compact(&mut self) -> StorageResult<()> {
        self.rewrite(None)
    }

    fn scan(&mut self) -> StorageResult<()> {
        let mut buf = Vec::new();
        (&self.file).seek(SeekFrom::Start(0))?;
        (&self.file).read_to_end(&mut buf)?;

        self.index.clear();
        let mut stale = Vec::new();
        let mut skipped = 0usize;
        let mut offset = 0usize;

        while let Some(header) = RecordHeader::parse(&buf[offset..]) {
            let total = header.total_len();
            let fits = offset + total <= buf.len();
            if fits && header.is_disposed() {
                offset += total;
                continue;
            }
            if fits && split_crc(&buf[offset..offset + total]).is_ok() {
                let slot = Slot {
                    offset: offset as u64,
                    type_id: header.type_id,
                    len: total,
                };
                if let Some(old) = self.index.insert(header.id, slot) {
                    stale.push(old.offset);
                }
                offset += total;
                continue;
            }

            // a bad length field must not swallow the records behind it
            match next_valid_record(&buf, offset + 1) {
                Some(next) => {
                    warn!(offset, id = %header.id, resumed_at = next, "corrupt record; skipping");
                    skipped += 1;
                    offset = next;
                }
                None if fits => {
                    warn!(offset, id = %header.id, "CRC mismatch; skipping record");
                    skipped += 1;
                    offset += total;
                }
                None => {
                    warn!(offset, len = total, file_len = buf.len(), "torn record; stopping scan");
                    break;
                }
            }
        }

        if offset < buf.len() {
            self.file.set_len(offset as u64)?;
        }
        self.end = offset as u64;

        // an earlier copy must not come back once the later one is disposed
        for old in stale {
            self.zero_id(old)?;
        }

        debug!(
            records = self.index.len(),
            skipped,
            end = self.end,
            "record file scanned"
        );
        Ok(())
    }

    fn write_at(&self, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(bytes)?;
        if self.config.sync_every_write {
            f.sync_data()?;
        }
        Ok(())
    }

    fn read_slot(&self, slot: &Slot) -> StorageResult<Vec<u8>> {
        let mut f = &self.file;
        let mut buf = vec![0u8; slot.len];
        f.seek(SeekFrom::Start(slot.offset))?;
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn zero_id(&self, offset: u64) -> StorageResult<()> {
        self.write_at(offset, &ObjectId::INVALID.to_le_bytes())
    }

    /// Copy live records into a fresh file and swap it in. An `incoming`
    /// record replaces its old copy in the fresh file, so both versions
    /// exist on disk until the swap.
    fn rewrite(&mut self, incoming: Option<(&StoredRecord, &[u8])>) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let mut index = BTreeMap::new();
        let mut offset = 0u64;

        let skip = incoming.map(|(record, _)| record.id);
        for (&id, slot) in &self.index {
            if Some(id) == skip {
                continue;
            }
            let bytes = self.read_slot(slot)?;
            tmp.write_all(&bytes)?;
            index.insert(id, Slot { offset, ..*slot });
            offset += slot.len as u64;
        }
        if let Some((record, bytes)) = incoming {
            tmp.write_all(bytes)?;
            let slot = Slot {
                offset,
                type_id: record.type_id,
                len: bytes.len(),
            };
            index.insert(record.id, slot);
            offset += bytes.len() as u64;
        }
        tmp.as_file().sync_all()?;

        let before = self.end;
        self.file = tmp.persist(&self.path).map_err(|e| e.error)?;
        self.index = index;
        self.end = offset;
        debug!(before, after = self.end, "record file compacted");
        Ok(())
    }

    fn live_bytes(&self) -> usize {
        self.index.values().map(|s| s.len).sum()
    }
}

/// Offset of the first intact, live record starting at or after `from`.
fn next_valid_record(buf: &[u8], from: usize) -> Option<usize> {
    (from..buf.len()).find(|&at| {
        RecordHeader::parse(&buf[at..]).is_some_and(|h| {
            let end = at + h.total_len();
            !h.is_disposed() && end <= buf.len() && split_crc(&buf[at..end]).is_ok()
        })
    })
}

impl ObjectStorage for FileObjectStorage {
    fn store(&mut self, record: &StoredRecord) -> StorageResult<()> {
        let bytes = record.to_bytes()?;
        let size = bytes.len();
        let max = self.config.max_bytes;

        let replaced = self.index.get(&record.id).map_or(0, |s| s.len);
        let live = self.live_bytes() - replaced;
        if live + size > max {
            return Err(StorageError::Full {
                needed: size,
                available: max.saturating_sub(live),
            });
        }

        if self.end as usize + size > max {
            self.rewrite(None)?;
            if self.end as usize + size > max {
                // only the old copy of this record is in the way
                self.rewrite(Some((record, &bytes)))?;
                debug!(id = %record.id, len = size, "record stored during compaction");
                return Ok(());
            }
        }

        let offset = self.end;
        self.write_at(offset, &bytes)?;
        self.end += size as u64;

        let slot = Slot {
            offset,
            type_id: record.type_id,
            len: size,
        };
        if let Some(old) = self.index.insert(record.id, slot) {
            self.zero_id(old.offset)?;
        }
        debug!(id = %record.id, offset, len = size, "record stored");
        Ok(())
    }

    fn retrieve(&self, id: ObjectId) -> StorageResult<Option<StoredRecord>> {
        let Some(slot) = self.index.get(&id) else {
            return Ok(None);
        };
        let bytes = self.read_slot(slot)?;
        StoredRecord::decode(&bytes, slot.offset).map(Some)
    }

    fn retrieve_all(&self) -> StorageResult<Vec<StoredRecord>> {
        self.index
            .values()
            .map(|slot| StoredRecord::decode(&self.read_slot(slot)?, slot.offset))
            .collect()
    }

    fn dispose(&mut self, id: ObjectId) -> StorageResult<bool> {
        match self.index.remove(&id) {
            Some(slot) => {
                self.zero_id(slot.offset)?;
                debug!(id = %id, offset = slot.offset, "record disposed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.file.set_len(0)?;
        if self.config.sync_every_write {
            self.file.sync_all()?;
        }
        self.index.clear();
        self.end = 0;
        debug!("record file cleared");
        Ok(())
    }

    fn used_bytes(&self) -> usize {
        self.live_bytes()
    }

    fn capacity(&self) -> usize {
        self.config.max_bytes
    }

    fn list(&self) -> StorageResult<Vec<(ObjectId, TypeId)>> {
        Ok(self
            .index
            .iter()
            .map(|(&id, slot)| (id, slot.type_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RECORD_OVERHEAD;

    fn record(id: u16, payload: &[u8]) -> StoredRecord {
        StoredRecord::new(ObjectId::new(id), TypeId::new(7), payload.to_vec())
    }

    fn open(path: &Path) -> FileObjectStorage {
        FileObjectStorage::open(path, FileStorageConfig::default()).unwrap()
    }

    fn flip_byte(path: &Path, at: u64) {
        let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
        let mut b = [0u8; 1];
        file.seek(SeekFrom::Start(at)).unwrap();
        file.read_exact(&mut b).unwrap();
        b[0] ^= 0xFF;
        file.seek(SeekFrom::Start(at)).unwrap();
        file.write_all(&b).unwrap();
        file.sync_all().unwrap();
    }

    #[test]
    fn store_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        {
            let mut store = open(&path);
            store.store(&record(100, &[1, 2, 3])).unwrap();
            store.store(&record(101, &[4])).unwrap();
            store
                .store(&StoredRecord::tombstone(ObjectId::new(102)))
                .unwrap();
        }

        let store = open(&path);
        assert_eq!(
            store.retrieve_all().unwrap(),
            vec![
                record(100, &[1, 2, 3]),
                record(101, &[4]),
                StoredRecord::tombstone(ObjectId::new(102)),
            ]
        );
        assert_eq!(store.used_bytes(), 3 * RECORD_OVERHEAD + 4);
    }

    #[test]
    fn empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("nested/dir/objects.dat"));
        assert!(store.retrieve_all().unwrap().is_empty());
        assert_eq!(store.retrieve(ObjectId::new(1)).unwrap(), None);
        assert_eq!(store.file_len(), 0);
    }

    #[test]
    fn replacement_wins_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        {
            let mut store = open(&path);
            store.store(&record(100, &[1])).unwrap();
            store.store(&record(100, &[2, 2])).unwrap();
            assert_eq!(store.used_bytes(), RECORD_OVERHEAD + 2);
            assert_eq!(store.file_len(), (2 * RECORD_OVERHEAD + 3) as u64);
        }
        let store = open(&path);
        assert_eq!(
            store.retrieve(ObjectId::new(100)).unwrap(),
            Some(record(100, &[2, 2]))
        );
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn dispose_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        {
            let mut store = open(&path);
            store.store(&record(100, &[1])).unwrap();
            store.store(&record(101, &[1])).unwrap();
            assert!(store.dispose(ObjectId::new(100)).unwrap());
            assert!(!store.dispose(ObjectId::new(100)).unwrap());
        }
        let store = open(&path);
        assert_eq!(store.list().unwrap(), vec![(ObjectId::new(101), TypeId::new(7))]);
    }

    #[test]
    fn crc_failure_skips_only_that_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        {
            let mut store = open(&path);
            store.store(&record(100, &[1, 2, 3])).unwrap();
            store.store(&record(101, &[4, 5, 6])).unwrap();
        }
        // first payload byte of the first record
        flip_byte(&path, 6);

        let store = open(&path);
        assert_eq!(store.retrieve(ObjectId::new(100)).unwrap(), None);
        assert_eq!(
            store.retrieve(ObjectId::new(101)).unwrap(),
            Some(record(101, &[4, 5, 6]))
        );
    }

    #[test]
    fn torn_tail_is_cut_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        let full_len;
        {
            let mut store = open(&path);
            store.store(&record(100, &[1])).unwrap();
            store.store(&record(101, &[2])).unwrap();
            full_len = store.file_len();
        }
        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(full_len - 3).unwrap();
        }

        let mut store = open(&path);
        assert_eq!(store.list().unwrap(), vec![(ObjectId::new(100), TypeId::new(7))]);
        assert_eq!(store.file_len(), (RECORD_OVERHEAD + 1) as u64);

        // appends continue from the cut
        store.store(&record(102, &[3])).unwrap();
        drop(store);
        let store = open(&path);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_length_keeps_the_records_behind_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        let full_len;
        {
            let mut store = open(&path);
            store.store(&record(100, &[1, 2, 3])).unwrap();
            store.store(&record(101, &[4, 5, 6])).unwrap();
            store.store(&record(102, &[7, 8, 9])).unwrap();
            full_len = store.file_len();
        }
        // high byte of the first record's length field
        flip_byte(&path, 5);

        let mut store = open(&path);
        assert_eq!(store.retrieve(ObjectId::new(100)).unwrap(), None);
        assert_eq!(
            store.retrieve(ObjectId::new(101)).unwrap(),
            Some(record(101, &[4, 5, 6]))
        );
        assert_eq!(
            store.retrieve(ObjectId::new(102)).unwrap(),
            Some(record(102, &[7, 8, 9]))
        );
        assert_eq!(store.file_len(), full_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), full_len);

        store.store(&record(103, &[1])).unwrap();
        drop(store);
        assert_eq!(open(&path).list().unwrap().len(), 3);
    }

    #[test]
    fn corrupt_record_in_the_middle_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        {
            let mut store = open(&path);
            store.store(&record(100, &[1, 2, 3])).unwrap();
            store.store(&record(101, &[4, 5, 6])).unwrap();
            store.store(&record(102, &[7, 8, 9])).unwrap();
        }
        // low byte of the second record's length field
        flip_byte(&path, (RECORD_OVERHEAD + 3 + 4) as u64);

        let store = open(&path);
        assert_eq!(
            store.list().unwrap(),
            vec![
                (ObjectId::new(100), TypeId::new(7)),
                (ObjectId::new(102), TypeId::new(7)),
            ]
        );
    }

    #[test]
    fn later_duplicate_wins_and_earlier_is_retired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        // two intact copies, as left by a crash between append and dispose
        let mut bytes = record(100, &[1]).to_bytes().unwrap();
        bytes.extend(record(100, &[2]).to_bytes().unwrap());
        fs::write(&path, &bytes).unwrap();

        let mut store = open(&path);
        assert_eq!(
            store.retrieve(ObjectId::new(100)).unwrap(),
            Some(record(100, &[2]))
        );
        store.dispose(ObjectId::new(100)).unwrap();
        drop(store);

        let store = open(&path);
        assert_eq!(store.retrieve(ObjectId::new(100)).unwrap(), None);
    }

    #[test]
    fn compaction_reclaims_disposed_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        let config = FileStorageConfig {
            max_bytes: 3 * (RECORD_OVERHEAD + 4),
            ..FileStorageConfig::default()
        };
        let mut store = FileObjectStorage::open(&path, config.clone()).unwrap();
        store.store(&record(101, &[0; 4])).unwrap();
        for i in 0..20u8 {
            store.store(&record(100, &[i; 4])).unwrap();
            assert!(store.file_len() as usize <= config.max_bytes);
        }
        drop(store);

        let store = FileObjectStorage::open(&path, config).unwrap();
        assert_eq!(
            store.retrieve(ObjectId::new(100)).unwrap(),
            Some(record(100, &[19; 4]))
        );
        assert_eq!(
            store.retrieve(ObjectId::new(101)).unwrap(),
            Some(record(101, &[0; 4]))
        );
    }

    #[test]
    fn replacement_fits_when_only_old_copy_is_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        let config = FileStorageConfig {
            max_bytes: RECORD_OVERHEAD + 8,
            ..FileStorageConfig::default()
        };
        let mut store = FileObjectStorage::open(&path, config).unwrap();
        store.store(&record(100, &[1; 8])).unwrap();
        store.store(&record(100, &[2; 6])).unwrap();
        assert_eq!(
            store.retrieve(ObjectId::new(100)).unwrap(),
            Some(record(100, &[2; 6]))
        );
    }

    #[test]
    fn replacement_during_compaction_lands_in_the_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        let config = FileStorageConfig {
            max_bytes: 2 * RECORD_OVERHEAD + 8,
            ..FileStorageConfig::default()
        };
        let mut store = FileObjectStorage::open(&path, config.clone()).unwrap();
        store.store(&record(101, &[0])).unwrap();
        store.store(&record(100, &[1; 7])).unwrap();
        store.store(&record(100, &[2; 7])).unwrap();

        let expected = [record(101, &[0]), record(100, &[2; 7])]
            .iter()
            .flat_map(|r| r.to_bytes().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(fs::read(&path).unwrap(), expected);
        assert_eq!(store.file_len(), expected.len() as u64);
        drop(store);

        let store = FileObjectStorage::open(&path, config).unwrap();
        assert_eq!(
            store.retrieve(ObjectId::new(100)).unwrap(),
            Some(record(100, &[2; 7]))
        );
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn failed_compaction_keeps_the_old_copy() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let path = data.join("objects.dat");
        let config = FileStorageConfig {
            max_bytes: RECORD_OVERHEAD + 8,
            ..FileStorageConfig::default()
        };
        let mut store = FileObjectStorage::open(&path, config).unwrap();
        store.store(&record(100, &[1; 8])).unwrap();

        // no temporary file can be created next to the record file
        fs::remove_dir_all(&data).unwrap();
        let err = store.store(&record(100, &[2; 6])).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(
            store.retrieve(ObjectId::new(100)).unwrap(),
            Some(record(100, &[1; 8]))
        );
    }

    #[test]
    fn full_when_live_records_exceed_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        let config = FileStorageConfig {
            max_bytes: 2 * RECORD_OVERHEAD + 2,
            ..FileStorageConfig::default()
        };
        let mut store = FileObjectStorage::open(&path, config).unwrap();
        store.store(&record(100, &[1])).unwrap();
        store.store(&record(101, &[1])).unwrap();
        let err = store.store(&record(102, &[1])).unwrap_err();
        assert!(matches!(err, StorageError::Full { .. }));
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn clear_empties_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.dat");
        let mut store = open(&path);
        store.store(&record(100, &[1])).unwrap();
        store.clear().unwrap();
        assert_eq!(store.file_len(), 0);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        store.store(&record(101, &[1])).unwrap();
        drop(store);
        assert_eq!(open(&path).list().unwrap().len(), 1);
    }
}
