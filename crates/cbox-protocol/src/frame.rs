//! Request and response frames.
//!
//! Request:
//! ```text
//! [1 byte: command tag]
//! [fields: id u16 | type u16, depending on the command]
//! [payload: WRITE and CREATE only, runs to the checksum]
//! [4 bytes: CRC32 of everything above (little-endian)]
//! ```
//!
//! Response:
//! ```text
//! [1 byte: status, 0 = ok, otherwise an error code]
//! [2 bytes: object id, for commands that echo one]
//! [payload]
//! [4 bytes: CRC32]
//! ```
//! A request that fails to decode gets a bare `[status][crc]` response.

use tracing::debug;

use cbox_codec::{append_crc, split_crc, DataIn, CRC_SIZE};
use cbox_types::{CboxError, CboxResult, ObjectId};

use crate::command::{Command, Opcode};

/// Largest request frame accepted, checksum included.
pub const MAX_FRAME_SIZE: usize = 4096;

/// Shortest possible request: a tag and a checksum.
pub const MIN_FRAME_SIZE: usize = 1 + CRC_SIZE;

/// Decode a request frame.
///
/// Fails with `InputStreamReadError` for a frame that is too short or too
/// long, `CrcErrorInCommand` on a checksum mismatch, `InvalidCommand` for an
/// unknown tag, and `InputStreamDecodingError` when a command without a
/// payload carries extra bytes.
pub fn decode_request(frame: &[u8]) -> CboxResult<Command<'_>> {
    if frame.len() < MIN_FRAME_SIZE || frame.len() > MAX_FRAME_SIZE {
        debug!(len = frame.len(), "frame length out of range");
        return Err(CboxError::InputStreamReadError);
    }
    let body = split_crc(frame)?;
    let mut input = DataIn::new(body);
    let tag = input.get_u8()?;
    let opcode = Opcode::from_u8(tag).ok_or_else(|| {
        debug!(tag, "unknown command tag");
        CboxError::InvalidCommand
    })?;

    let command = match opcode {
        Opcode::Read => Command::Read {
            id: input.get_object_id()?,
        },
        Opcode::Write => Command::Write {
            id: input.get_object_id()?,
            payload: input.rest(),
        },
        Opcode::Create => Command::Create {
            type_id: input.get_type_id()?,
            payload: input.rest(),
        },
        Opcode::Delete => Command::Delete {
            id: input.get_object_id()?,
        },
        Opcode::List => Command::List,
        Opcode::ReadStored => Command::ReadStored {
            id: input.get_object_id()?,
        },
        Opcode::ListStored => Command::ListStored,
        Opcode::Reset => Command::Reset,
        Opcode::ClearObjects => Command::ClearObjects,
        Opcode::ListCompatible => Command::ListCompatible {
            iface: input.get_type_id()?,
        },
    };
    input.expect_end()?;
    Ok(command)
}

/// Encode a request frame. Used by hosts and by tests.
pub fn encode_request(command: &Command<'_>) -> Vec<u8> {
    let mut buf = vec![command.opcode() as u8];
    match *command {
        Command::Read { id }
        | Command::Delete { id }
        | Command::ReadStored { id } => buf.extend_from_slice(&id.to_le_bytes()),
        Command::Write { id, payload } => {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(payload);
        }
        Command::Create { type_id, payload } => {
            buf.extend_from_slice(&type_id.to_le_bytes());
            buf.extend_from_slice(payload);
        }
        Command::ListCompatible { iface } => buf.extend_from_slice(&iface.to_le_bytes()),
        Command::List | Command::ListStored | Command::Reset | Command::ClearObjects => {}
    }
    append_crc(&mut buf);
    buf
}

/// Outcome of one command, ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Result<(), CboxError>,
    pub id: Option<ObjectId>,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn ok(id: Option<ObjectId>, payload: Vec<u8>) -> Self {
        Self {
            status: Ok(()),
            id,
            payload,
        }
    }

    pub fn error(err: CboxError, id: Option<ObjectId>) -> Self {
        Self {
            status: Err(err),
            id,
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Wire status byte.
    pub fn status_code(&self) -> u8 {
        match self.status {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 2 + self.payload.len() + CRC_SIZE);
        buf.push(self.status_code());
        if let Some(id) = self.id {
            buf.extend_from_slice(&id.to_le_bytes());
        }
        buf.extend_from_slice(&self.payload);
        append_crc(&mut buf);
        buf
    }

    /// Decode a response to a command with `opcode`. Used by hosts and tests.
    pub fn decode(frame: &[u8], opcode: Opcode) -> CboxResult<Self> {
        let body = split_crc(frame)?;
        let mut input = DataIn::new(body);
        let status = match input.get_u8()? {
            0 => Ok(()),
            code => Err(CboxError::from_code(code).unwrap_or(CboxError::UnknownError)),
        };
        // a request that never decoded is answered without an id
        let id = if opcode.echoes_id() && input.remaining() >= 2 {
            Some(input.get_object_id()?)
        } else {
            None
        };
        Ok(Self {
            status,
            id,
            payload: input.rest().to_vec(),
        })
    }
}
