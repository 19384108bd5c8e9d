//! Error types for the virtual filesystem and the bus layer.

use std::path::PathBuf;

/// Filesystem and stream error type with contextual variants.
///
/// Every failure the protocol layer can meet while resolving a path, opening a
/// stream or walking a container ends up here. None of them is fatal to the
/// drive: the controller turns them into a "file not found" on the bus.
///
/// # Examples
///
/// ```rust
/// use iecdrive::VfsError;
///
/// let err = VfsError::NotFound { path: "/GAMES/ELITE".into() };
/// assert_eq!(err.to_string(), "not found: /GAMES/ELITE");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    // Path errors
    /// Path does not exist on its backend.
    #[error("not found: {path}")]
    NotFound {
        /// The url that was not found.
        path: String,
    },

    /// The outer container exists but holds no entry with the requested name.
    #[error("entry not found: {entry} in {stream_path}")]
    EntryNotFound {
        /// The container the entry was looked up in.
        stream_path: String,
        /// The entry that was requested.
        entry: String,
    },

    /// Path could not be parsed or escapes its backend.
    #[error("invalid path: {path} ({reason})")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    // Capability errors
    /// Operation is not supported by this node or stream.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// Backend is read-only.
    #[error("read-only filesystem: {operation}")]
    ReadOnly {
        /// The operation that was attempted.
        operation: &'static str,
    },

    // Data errors
    /// Container bytes do not decode.
    #[error("corrupted data: {path} ({details})")]
    CorruptedData {
        /// The container that failed to decode.
        path: String,
        /// Details about the corruption.
        details: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    // Backend errors
    /// Remote transport failed.
    #[error("transport error: {url} ({reason})")]
    Transport {
        /// The url being accessed.
        url: String,
        /// Transport-supplied reason.
        reason: String,
    },

    /// I/O error with context.
    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The host path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl VfsError {
    /// Wrap an I/O error with the operation and host path it happened on.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound {
                path: path.into().display().to_string(),
            },
            _ => VfsError::Io {
                operation,
                path: path.into(),
                source,
            },
        }
    }

    /// Returns `true` for errors that mean "there is nothing there".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VfsError::NotFound { .. } | VfsError::EntryNotFound { .. }
        )
    }
}

impl From<std::io::Error> for VfsError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound {
                path: String::new(),
            },
            std::io::ErrorKind::Unsupported => VfsError::NotSupported { operation: "io" },
            _ => VfsError::Io {
                operation: "io",
                path: PathBuf::new(),
                source: error,
            },
        }
    }
}

/// Errors reported by the bus primitives.
///
/// These never escape [`Drive`](crate::Drive); they decide whether a transfer
/// stops early and which status code gets queued.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The command framing under ATN was malformed.
    #[error("bus framing error")]
    Framing,

    /// The host did not complete a handshake in time.
    #[error("{operation}: bus timeout")]
    Timeout {
        /// The primitive that timed out.
        operation: &'static str,
    },

    /// The upstream acknowledgment header was missing or malformed.
    #[error("response not sync: {details}")]
    SyncMismatch {
        /// What was read instead.
        details: String,
    },
}
