//! Resource error types.

use std::io;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use hako_gvdb::GvdbError;

/// Errors surfaced by bundles, the registry and `resource:` files.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No entry at the path in any bundle or overlay.
    #[error("the resource at '{0}' does not exist")]
    NotFound(String),

    /// The path exists but is not a directory.
    #[error("the resource at '{0}' is not a directory")]
    NotDirectory(String),

    /// Malformed bundle, decompression failure or structural violation.
    #[error("{0}")]
    Internal(String),

    /// Loading a bundle from disk failed.
    #[error("{path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Empty or syntactically invalid input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller's cancellation token fired.
    #[error("operation was cancelled")]
    Cancelled,
}

impl ResourceError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotDirectory error.
    pub fn not_directory(path: impl Into<String>) -> Self {
        Self::NotDirectory(path.into())
    }

    /// Create an Internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a Filesystem error.
    pub fn filesystem(path: impl Into<String>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<GvdbError> for ResourceError {
    fn from(e: GvdbError) -> Self {
        match e {
            GvdbError::Io { path, source } => {
                Self::filesystem(path.display().to_string(), source)
            }
            GvdbError::Corrupt(msg) => Self::Internal(format!("corrupt bundle: {msg}")),
            GvdbError::InvalidKey(msg) => Self::InvalidArgument(msg),
        }
    }
}

/// Convert ResourceError to std::io::Error for compatibility.
impl From<ResourceError> for io::Error {
    fn from(e: ResourceError) -> Self {
        match e {
            ResourceError::NotFound(path) => {
                io::Error::new(io::ErrorKind::NotFound, format!("{path} does not exist"))
            }
            ResourceError::NotDirectory(path) => io::Error::new(io::ErrorKind::NotADirectory, path),
            ResourceError::Internal(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            ResourceError::Filesystem { source, .. } => source,
            ResourceError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            ResourceError::Cancelled => {
                io::Error::new(io::ErrorKind::Interrupted, "operation was cancelled")
            }
        }
    }
}

/// Resource result type.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Fail with [`ResourceError::Cancelled`] once `cancel` has fired.
pub fn check_cancelled(cancel: Option<&CancellationToken>) -> ResourceResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(ResourceError::Cancelled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_path() {
        let err = ResourceError::not_found("/org/app/missing.png");
        assert!(err.to_string().contains("/org/app/missing.png"));
        assert!(err.is_not_found());

        let err = ResourceError::not_directory("/a");
        assert_eq!(err.to_string(), "the resource at '/a' is not a directory");
    }

    #[test]
    fn test_io_conversion() {
        let io: io::Error = ResourceError::not_found("/x").into();
        assert_eq!(io.kind(), io::ErrorKind::NotFound);

        let io: io::Error = ResourceError::Cancelled.into();
        assert_eq!(io.kind(), io::ErrorKind::Interrupted);

        let source = io::Error::from_raw_os_error(2);
        let io: io::Error = ResourceError::filesystem("/tmp/b.hako", source).into();
        assert_eq!(io.raw_os_error(), Some(2));
    }

    #[test]
    fn test_check_cancelled() {
        assert!(check_cancelled(None).is_ok());
        let token = CancellationToken::new();
        assert!(check_cancelled(Some(&token)).is_ok());
        token.cancel();
        assert!(matches!(
            check_cancelled(Some(&token)),
            Err(ResourceError::Cancelled)
        ));
    }

    #[test]
    fn test_gvdb_conversion() {
        let err: ResourceError = GvdbError::corrupt("bad signature").into();
        assert!(matches!(err, ResourceError::Internal(ref m) if m.contains("bad signature")));
    }
}
