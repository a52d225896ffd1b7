//! Persisted object records.
//!
//! On-storage format, all little-endian:
//! ```text
//! [2 bytes: object id]
//! [2 bytes: type id (0 = tombstoned id)]
//! [2 bytes: payload length]
//! [N bytes: persisted payload]
//! [4 bytes: CRC32 of everything above]
//! ```
//! A record whose id field reads `0` has been disposed. Its bytes stay in
//! place until the next compaction and are skipped when scanning.

use cbox_codec::{CrcDataOut, DataOut, CRC_SIZE};
use cbox_types::{CboxResult, ObjectId, TypeId};

use crate::error::{StorageError, StorageResult};

/// Id, type and length fields.
pub const HEADER_SIZE: usize = 6;

/// Bytes a record adds on top of its payload.
pub const RECORD_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;

/// Largest payload a record can hold.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// One object's persisted state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: ObjectId,
    pub type_id: TypeId,
    pub payload: Vec<u8>,
}

impl StoredRecord {
    /// Record holding `payload`, the persisted stream of a `type_id` object.
    pub fn new(id: ObjectId, type_id: TypeId, payload: Vec<u8>) -> Self {
        Self {
            id,
            type_id,
            payload,
        }
    }

    /// Marker keeping `id` reserved across restarts.
    pub fn tombstone(id: ObjectId) -> Self {
        Self::new(id, TypeId::INVALID, Vec::new())
    }

    pub fn is_tombstone(&self) -> bool {
        !self.type_id.is_valid()
    }

    /// Size of the encoded record.
    pub fn encoded_len(&self) -> usize {
        RECORD_OVERHEAD + self.payload.len()
    }

    pub fn encode(&self, out: &mut dyn DataOut) -> StorageResult<()> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(StorageError::PayloadTooLarge(self.payload.len()));
        }
        self.encode_checked(out).map_err(StorageError::Stream)
    }

    fn encode_checked(&self, out: &mut dyn DataOut) -> CboxResult<()> {
        let mut crc_out = CrcDataOut::new(out);
        crc_out.put_object_id(self.id)?;
        crc_out.put_type_id(self.type_id)?;
        crc_out.put_u16(self.payload.len() as u16)?;
        crc_out.write_bytes(&self.payload)?;
        crc_out.finish()
    }

    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a record occupying exactly `buf`. `offset` is only used in
    /// error reports.
    pub fn decode(buf: &[u8], offset: u64) -> StorageResult<Self> {
        let header = RecordHeader::parse(buf).ok_or_else(|| StorageError::Corrupt {
            offset,
            reason: "short header".to_string(),
        })?;
        if buf.len() != header.total_len() {
            return Err(StorageError::Corrupt {
                offset,
                reason: format!("length {} does not match header", buf.len()),
            });
        }
        let body = cbox_codec::split_crc(buf).map_err(|_| StorageError::Corrupt {
            offset,
            reason: "CRC mismatch".to_string(),
        })?;
        Ok(Self::new(
            header.id,
            header.type_id,
            body[HEADER_SIZE..].to_vec(),
        ))
    }
}

/// Fixed-size front of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: ObjectId,
    pub type_id: TypeId,
    pub payload_len: usize,
}

impl RecordHeader {
    /// Parse the header at the start of `buf`, or `None` if `buf` is too short.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let head = buf.get(..HEADER_SIZE)?;
        Some(Self {
            id: ObjectId::from_le_bytes([head[0], head[1]]),
            type_id: TypeId::from_le_bytes([head[2], head[3]]),
            payload_len: u16::from_le_bytes([head[4], head[5]]) as usize,
        })
    }

    pub fn total_len(&self) -> usize {
        RECORD_OVERHEAD + self.payload_len
    }

    /// The record was disposed in place.
    pub fn is_disposed(&self) -> bool {
        !self.id.is_valid()
    }
}
