//! Errors reported by vectors and edit sessions.

/// An error that occurred while reading or modifying a vector.
///
/// Every failing operation checks its preconditions before touching any
/// state, so the receiver is left exactly as it was.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("index {index} out of range for a vector of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("can't pop an empty vector")]
    EmptyCollection,

    #[error("key must be an integer")]
    InvalidKey,

    #[error("transient used after its edit session ended")]
    SessionClosed,

    #[error("no handler is configured for this vector")]
    NoHandler,
}

impl Error {
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            len,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
