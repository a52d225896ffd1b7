//! Persistent record storage for the cbox runtime.
//!
//! Each persisted object occupies one CRC-checked record holding its id,
//! its block type and the output of its `stream_persisted_to`. Records are
//! rewritten whole on every change. A record with type `0` keeps a deleted
//! id reserved across restarts.
//!
//! # Backends
//!
//! - [`InMemoryObjectStorage`]: bounded in-memory map, for tests and
//!   volatile boxes
//! - [`FileObjectStorage`]: single append-or-rewrite file with in-place
//!   disposal and compaction

pub mod error;
pub mod file;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use file::{FileObjectStorage, FileStorageConfig};
pub use memory::{InMemoryObjectStorage, DEFAULT_CAPACITY};
pub use record::{RecordHeader, StoredRecord, HEADER_SIZE, MAX_PAYLOAD, RECORD_OVERHEAD};
pub use traits::ObjectStorage;
