//! GVDB error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// GVDB error type.
#[derive(Debug, Error)]
pub enum GvdbError {
    /// The image is truncated or structurally inconsistent.
    #[error("corrupt gvdb image: {0}")]
    Corrupt(String),

    /// A key cannot be stored (too long, bad parent relationship, ...).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Opening or mapping a file failed.
    #[error("failed to load {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GvdbError {
    /// Create a Corrupt error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Create an InvalidKey error.
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Create an Io error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<GvdbError> for io::Error {
    fn from(e: GvdbError) -> Self {
        match e {
            GvdbError::Io { source, .. } => source,
            GvdbError::Corrupt(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            GvdbError::InvalidKey(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
        }
    }
}

/// GVDB result type.
pub type GvdbResult<T> = Result<T, GvdbError>;
