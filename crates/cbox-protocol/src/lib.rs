//! Wire protocol for the cbox runtime.
//!
//! A host talks to a box in single request/response exchanges. Each request
//! frame names a command, its fields and an optional object payload, and
//! ends in a CRC-32. Each response starts with a status byte carrying a
//! [`CboxError`](cbox_types::CboxError) code, or `0` for success.

pub mod command;
pub mod frame;

pub use command::{Command, Opcode};
pub use frame::{
    decode_request, encode_request, Response, MAX_FRAME_SIZE, MIN_FRAME_SIZE,
};
