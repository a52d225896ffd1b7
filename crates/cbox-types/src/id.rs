use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an object in the registry.
///
/// Ids are small unsigned integers. `0` never names an object, and the top
/// of the range (`0xFF00..=0xFFFF`) is reserved for sentinels and is never
/// handed out by the allocator. An id stays bound to the same object for the
/// object's whole life, including across restarts when the object is
/// persisted.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u16);

impl ObjectId {
    /// The invalid id. Used on the wire to mean "no object".
    pub const INVALID: Self = Self(0);

    /// First id of the reserved sentinel range.
    pub const RESERVED_START: u16 = 0xFF00;

    /// Highest id the allocator may hand out.
    pub const MAX_ALLOCATABLE: Self = Self(Self::RESERVED_START - 1);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns `true` unless this is [`ObjectId::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns `true` if the id lies in the reserved sentinel range.
    pub const fn is_reserved(self) -> bool {
        self.0 >= Self::RESERVED_START
    }

    /// The id directly after this one, or `None` at the end of the range.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ObjectId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<ObjectId> for u16 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Tag naming a concrete object implementation or a capability.
///
/// The same number space serves two purposes: on the wire it selects which
/// factory builds an object, and in capability lookups it selects which
/// handle an object should hand out.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u16);

impl TypeId {
    /// Not a type. In storage records it marks a tombstoned id.
    pub const INVALID: Self = Self(0);

    /// Placeholder left behind at a deleted or deprecated id.
    pub const TOMBSTONE: Self = Self(u16::MAX - 2);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({:#06x})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl From<u16> for TypeId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}
