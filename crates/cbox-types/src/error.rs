use thiserror::Error;

/// Outcome of a protocol, object or storage operation.
///
/// The set is closed and every variant has a stable one-byte code that is
/// sent on the wire as the response status (`0` means success and has no
/// variant). Variants are grouped by [`ErrorClass`] so a client can tell
/// "the bytes were bad" apart from "the object refused" and from "the box is
/// out of room".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u8)]
pub enum CboxError {
    #[error("unknown error")]
    UnknownError = 1,

    #[error("invalid command")]
    InvalidCommand = 2,

    #[error("input stream read error")]
    InputStreamReadError = 10,

    #[error("output stream write error")]
    OutputStreamWriteError = 11,

    #[error("input stream decoding error")]
    InputStreamDecodingError = 12,

    #[error("output stream encoding error")]
    OutputStreamEncodingError = 13,

    #[error("CRC error in command")]
    CrcErrorInCommand = 14,

    #[error("payload schema version mismatch")]
    SchemaMismatch = 15,

    #[error("object not found")]
    ObjectNotFound = 20,

    #[error("invalid object id")]
    InvalidObjectId = 21,

    #[error("invalid object type")]
    InvalidObjectType = 22,

    #[error("object not writable")]
    ObjectNotWritable = 23,

    #[error("object not creatable")]
    ObjectNotCreatable = 24,

    #[error("object not deletable")]
    ObjectNotDeletable = 25,

    #[error("invalid parameter")]
    InvalidParameter = 26,

    #[error("insufficient heap")]
    InsufficientHeap = 30,

    #[error("object id space exhausted")]
    IdSpaceExhausted = 31,

    #[error("persisted object not found")]
    PersistedObjectNotFound = 40,

    #[error("persisted storage write error")]
    PersistedStorageWriteError = 41,

    #[error("persisted storage full")]
    PersistedStorageFull = 42,

    #[error("persisted block stream error")]
    PersistedBlockStreamError = 43,

    #[error("persisting not needed")]
    PersistingNotNeeded = 44,
}

/// Coarse grouping of [`CboxError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed, truncated or corrupt bytes. Detected before any mutation.
    Stream,
    /// The addressed object is missing, of the wrong kind, or refuses.
    Object,
    /// Id space or memory exhausted.
    Resource,
    /// Non-volatile storage could not serve the request.
    Storage,
    Unknown,
}

impl CboxError {
    const ALL: [CboxError; 22] = [
        Self::UnknownError,
        Self::InvalidCommand,
        Self::InputStreamReadError,
        Self::OutputStreamWriteError,
        Self::InputStreamDecodingError,
        Self::OutputStreamEncodingError,
        Self::CrcErrorInCommand,
        Self::SchemaMismatch,
        Self::ObjectNotFound,
        Self::InvalidObjectId,
        Self::InvalidObjectType,
        Self::ObjectNotWritable,
        Self::ObjectNotCreatable,
        Self::ObjectNotDeletable,
        Self::InvalidParameter,
        Self::InsufficientHeap,
        Self::IdSpaceExhausted,
        Self::PersistedObjectNotFound,
        Self::PersistedStorageWriteError,
        Self::PersistedStorageFull,
        Self::PersistedBlockStreamError,
        Self::PersistingNotNeeded,
    ];

    /// Wire code of this error.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`code`](Self::code). Returns `None` for `0` (success) and
    /// for codes that name no variant.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    pub const fn class(self) -> ErrorClass {
        match self {
            Self::InvalidCommand
            | Self::InputStreamReadError
            | Self::OutputStreamWriteError
            | Self::InputStreamDecodingError
            | Self::OutputStreamEncodingError
            | Self::CrcErrorInCommand
            | Self::SchemaMismatch => ErrorClass::Stream,
            Self::ObjectNotFound
            | Self::InvalidObjectId
            | Self::InvalidObjectType
            | Self::ObjectNotWritable
            | Self::ObjectNotCreatable
            | Self::ObjectNotDeletable
            | Self::InvalidParameter => ErrorClass::Object,
            Self::InsufficientHeap | Self::IdSpaceExhausted => ErrorClass::Resource,
            Self::PersistedObjectNotFound
            | Self::PersistedStorageWriteError
            | Self::PersistedStorageFull
            | Self::PersistedBlockStreamError
            | Self::PersistingNotNeeded => ErrorClass::Storage,
            Self::UnknownError => ErrorClass::Unknown,
        }
    }

    pub const fn is_stream_error(self) -> bool {
        matches!(self.class(), ErrorClass::Stream)
    }
}

/// Result alias used throughout the object runtime.
pub type CboxResult<T> = Result<T, CboxError>;
