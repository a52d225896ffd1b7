use cbox_types::{ObjectId, TypeId};

/// Command tags as they appear in the first byte of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Read = 0x01,
    Write = 0x02,
    Create = 0x03,
    Delete = 0x04,
    List = 0x05,
    ReadStored = 0x06,
    ListStored = 0x07,
    Reset = 0x08,
    ClearObjects = 0x09,
    ListCompatible = 0x0A,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::Read,
        Opcode::Write,
        Opcode::Create,
        Opcode::Delete,
        Opcode::List,
        Opcode::ReadStored,
        Opcode::ListStored,
        Opcode::Reset,
        Opcode::ClearObjects,
        Opcode::ListCompatible,
    ];

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| *op as u8 == tag)
    }

    /// Whether the response to this command carries an object id after the
    /// status byte.
    pub fn echoes_id(self) -> bool {
        matches!(
            self,
            Opcode::Read | Opcode::Write | Opcode::Create | Opcode::Delete | Opcode::ReadStored
        )
    }
}

/// A decoded request. Payloads borrow from the frame they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Read { id: ObjectId },
    Write { id: ObjectId, payload: &'a [u8] },
    Create { type_id: TypeId, payload: &'a [u8] },
    Delete { id: ObjectId },
    List,
    ReadStored { id: ObjectId },
    ListStored,
    /// Factory reset: every user object and every stored record.
    Reset,
    /// Drop user objects and their records but keep the id counter running.
    ClearObjects,
    /// Ids of objects implementing a capability tag.
    ListCompatible { iface: TypeId },
}

impl Command<'_> {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Read { .. } => Opcode::Read,
            Command::Write { .. } => Opcode::Write,
            Command::Create { .. } => Opcode::Create,
            Command::Delete { .. } => Opcode::Delete,
            Command::List => Opcode::List,
            Command::ReadStored { .. } => Opcode::ReadStored,
            Command::ListStored => Opcode::ListStored,
            Command::Reset => Opcode::Reset,
            Command::ClearObjects => Opcode::ClearObjects,
            Command::ListCompatible { .. } => Opcode::ListCompatible,
        }
    }

    /// The object id named in the request, if any.
    pub fn target(&self) -> Option<ObjectId> {
        match *self {
            Command::Read { id }
            | Command::Write { id, .. }
            | Command::Delete { id }
            | Command::ReadStored { id } => Some(id),
            _ => None,
        }
    }
}
