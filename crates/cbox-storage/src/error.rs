use cbox_types::CboxError;

/// Errors from record storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The record does not fit in the remaining budget.
    #[error("storage full: need {needed} bytes, {available} available")]
    Full { needed: usize, available: usize },

    /// Payload longer than a record length field can describe.
    #[error("record payload of {0} bytes is too large")]
    PayloadTooLarge(usize),

    /// A record failed its integrity check or is cut short.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The object refused to produce a persisted payload.
    #[error("object stream error: {0}")]
    Stream(CboxError),

    /// I/O error from the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for CboxError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Full { .. } | StorageError::PayloadTooLarge(_) => {
                CboxError::PersistedStorageFull
            }
            StorageError::Corrupt { .. } => CboxError::PersistedBlockStreamError,
            StorageError::Stream(e) => e,
            StorageError::Io(_) => CboxError::PersistedStorageWriteError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_protocol_codes() {
        assert_eq!(
            CboxError::from(StorageError::Corrupt {
                offset: 3,
                reason: "CRC mismatch".to_string()
            }),
            CboxError::PersistedBlockStreamError
        );
        assert_eq!(
            CboxError::from(StorageError::Full {
                needed: 10,
                available: 2
            }),
            CboxError::PersistedStorageFull
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert_eq!(
            CboxError::from(StorageError::from(io)),
            CboxError::PersistedStorageWriteError
        );
        assert_eq!(
            CboxError::from(StorageError::Stream(CboxError::PersistingNotNeeded)),
            CboxError::PersistingNotNeeded
        );
    }

    #[test]
    fn messages_name_the_problem() {
        let err = StorageError::Full {
            needed: 12,
            available: 4,
        };
        assert_eq!(err.to_string(), "storage full: need 12 bytes, 4 available");
    }
}
