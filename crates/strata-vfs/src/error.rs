//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A parameter was missing, empty or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Seek position outside `[0, length]`.
    #[error("position {position} out of boundary (length {length})")]
    OutOfBoundary {
        /// Requested absolute position.
        position: i64,
        /// Length of the file.
        length: u64,
    },

    /// Reading from the backing store failed.
    #[error("read failure: {path}")]
    ReadFailure {
        /// Path being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing to the backing store failed.
    #[error("write failure: {path}")]
    WriteFailure {
        /// Path being written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Directory enumeration failed mid-iteration.
    #[error("directory read failure: {path}")]
    DirectoryReadFailure {
        /// Directory being enumerated.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Operation not permitted for this kind of container.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Component access on a path without components.
    #[error("path has no components")]
    EmptyPath,

    /// Malformed path (e.g. `..` above the root).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration document could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] ron::error::SpannedError),
}

impl VfsError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a FileNotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    /// Create a ReadFailure error.
    pub fn read_failure(path: impl Into<String>, source: io::Error) -> Self {
        Self::ReadFailure {
            path: path.into(),
            source,
        }
    }

    /// Create a WriteFailure error.
    pub fn write_failure(path: impl Into<String>, source: io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }

    /// Create a DirectoryReadFailure error.
    pub fn directory_read_failure(path: impl Into<String>, source: io::Error) -> Self {
        Self::DirectoryReadFailure {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidAction error.
    pub fn invalid_action(msg: impl Into<String>) -> Self {
        Self::InvalidAction(msg.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Returns true if this is a FileNotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }
}

/// Convert VfsError to std::io::Error for use inside `Read`/`Seek` impls.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::FileNotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            e @ VfsError::OutOfBoundary { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            VfsError::ReadFailure { source, .. }
            | VfsError::WriteFailure { source, .. }
            | VfsError::DirectoryReadFailure { source, .. } => source,
            VfsError::InvalidAction(msg) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            e @ VfsError::EmptyPath => io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            e @ VfsError::Config(_) => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
