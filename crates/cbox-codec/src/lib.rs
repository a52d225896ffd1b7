//! Stream codec for the cbox object runtime.
//!
//! Everything that crosses the wire or lands in storage is read through a
//! [`DataIn`] and written through a [`DataOut`]. Scalars are fixed-width
//! little-endian. Object configuration and state travel as *proto payloads*:
//! a schema version byte, a `u16` length and a bincode body (see [`proto`]).
//!
//! Reads never consume input on failure, and payload decoding always goes
//! through a scratch value, so a caller can decode first and commit only on
//! success.

pub mod crc;
pub mod data_in;
pub mod data_out;
pub mod proto;

pub use crc::{append_crc, crc32, split_crc, CRC_SIZE};
pub use data_in::DataIn;
pub use data_out::{BlackholeDataOut, BoundedDataOut, CrcDataOut, DataOut};
pub use proto::{read_proto, write_proto, ProtoMessage, MAX_BODY_LEN};
