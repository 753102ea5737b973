//! Error types for file manager operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::mode::AccessMode;

/// Errors surfaced by file manager operations.
///
/// This is a closed set: every failure an operation can reject with is
/// one of these variants, and every variant carries the path and the
/// requested access mode, so a rejected operation can be reproduced
/// from its error alone.
#[derive(Debug, Error)]
pub enum FileError {
    /// A read-oriented open was requested against a path with no
    /// backing file.
    #[error("file '{}' does not exist (requested {} access)", .path.display(), .mode)]
    FileDoesNotExist {
        /// The path that had no backing file.
        path: PathBuf,
        /// The access mode that was requested.
        mode: AccessMode,
    },

    /// The path resolves to a directory or other non-regular entity.
    #[error("path '{}' does not represent a file (requested {} access)", .path.display(), .mode)]
    NotAFile {
        /// The path that named a non-regular entity.
        path: PathBuf,
        /// The access mode that was requested.
        mode: AccessMode,
    },

    /// The handle cache is full and every entry is pinned by an
    /// in-flight operation.
    ///
    /// Only produced under the fail-fast exhaustion policy; the queue
    /// policy parks the request instead.
    #[error("handle cache at capacity ({}); cannot open '{}' for {} access", .capacity, .path.display(), .mode)]
    CapacityExceeded {
        /// The path whose acquire was rejected.
        path: PathBuf,
        /// The access mode that was requested.
        mode: AccessMode,
        /// The configured capacity that was exhausted.
        capacity: usize,
    },

    /// The underlying I/O primitive failed during open, read, write, or
    /// flush. Also covers a text-mode read producing invalid UTF-8 and
    /// whole-file reads exceeding the configured bound.
    #[error("io failure on '{}' ({} access)", .path.display(), .mode)]
    Io {
        /// The path the failing operation targeted.
        path: PathBuf,
        /// The access mode of the failing operation.
        mode: AccessMode,
        /// The reported OS-level failure.
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    /// Wrap an OS-level failure with its operation context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, mode: AccessMode, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            mode,
            source,
        }
    }

    /// The path of the operation that was rejected.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::FileDoesNotExist { path, .. }
            | Self::NotAFile { path, .. }
            | Self::CapacityExceeded { path, .. }
            | Self::Io { path, .. } => path,
        }
    }

    /// The access mode of the operation that was rejected.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        match self {
            Self::FileDoesNotExist { mode, .. }
            | Self::NotAFile { mode, .. }
            | Self::CapacityExceeded { mode, .. }
            | Self::Io { mode, .. } => *mode,
        }
    }
}

/// Convenience result type for file manager operations.
pub type FileResult<T> = Result<T, FileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_operation_context() {
        let err = FileError::FileDoesNotExist {
            path: PathBuf::from("/data/missing.txt"),
            mode: AccessMode::Read,
        };
        assert_eq!(err.path(), Path::new("/data/missing.txt"));
        assert_eq!(err.mode(), AccessMode::Read);
        assert!(err.to_string().contains("/data/missing.txt"));
        assert!(err.to_string().contains("read"));
    }

    #[test]
    fn io_wrapper_preserves_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = FileError::io("/data/locked.bin", AccessMode::Append, inner);
        match err {
            FileError::Io { source, mode, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
                assert_eq!(mode, AccessMode::Append);
            },
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
