//! CRC-32 helpers shared by command frames and storage records.

use cbox_types::{CboxError, CboxResult};

/// Trailing checksum size in bytes.
pub const CRC_SIZE: usize = 4;

pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Append the little-endian CRC-32 of `buf` to `buf`.
pub fn append_crc(buf: &mut Vec<u8>) {
    let crc = crc32(buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Split a checksummed buffer into its body, verifying the trailing CRC.
///
/// Fails with `InputStreamReadError` if the buffer cannot even hold a CRC
/// and with `CrcErrorInCommand` if the checksum does not match.
pub fn split_crc(buf: &[u8]) -> CboxResult<&[u8]> {
    if buf.len() < CRC_SIZE {
        return Err(CboxError::InputStreamReadError);
    }
    let (body, tail) = buf.split_at(buf.len() - CRC_SIZE);
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    if crc32(body) != expected {
        return Err(CboxError::CrcErrorInCommand);
    }
    Ok(body)
}
