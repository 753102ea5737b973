//! The file handle state machine.

use std::io::SeekFrom;
use std::path::PathBuf;

use fdcache_core::{AccessMode, FileError, FileResult, HandleKind};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace};

/// One open file, bound to one descriptor for its lifetime.
///
/// A handle is either fully open (descriptor present, I/O permitted) or
/// fully closed (descriptor released, I/O fails); no intermediate state
/// is observable. `Open → Closed` is irreversible: reopening a path
/// always produces a new handle value.
#[derive(Debug)]
pub(crate) struct FileHandle {
    path: PathBuf,
    kind: HandleKind,
    file: Option<File>,
}

impl FileHandle {
    /// Open `path` with the access and encoding of `kind`.
    ///
    /// # Errors
    ///
    /// - [`FileError::FileDoesNotExist`] for read access to a missing
    ///   path
    /// - [`FileError::NotAFile`] when the path names a directory or
    ///   other non-regular entity
    /// - [`FileError::Io`] when the OS-level open fails
    pub(crate) async fn open(path: impl Into<PathBuf>, kind: HandleKind) -> FileResult<Self> {
        let path = path.into();

        match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => {
                return Err(FileError::NotAFile {
                    path,
                    mode: kind.mode,
                });
            },
            Ok(_) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Write and append modes create the file below.
                if kind.mode == AccessMode::Read {
                    return Err(FileError::FileDoesNotExist {
                        path,
                        mode: kind.mode,
                    });
                }
            },
            Err(e) => return Err(FileError::io(path, kind.mode, e)),
        }

        let mut options = OpenOptions::new();
        match kind.mode {
            AccessMode::Read => {
                options.read(true);
            },
            AccessMode::Write => {
                options.write(true).create(true).truncate(true);
            },
            AccessMode::Append => {
                options.append(true).create(true);
            },
        }

        let file = options.open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound if kind.mode == AccessMode::Read => {
                FileError::FileDoesNotExist {
                    path: path.clone(),
                    mode: kind.mode,
                }
            },
            std::io::ErrorKind::IsADirectory => FileError::NotAFile {
                path: path.clone(),
                mode: kind.mode,
            },
            _ => FileError::io(path.clone(), kind.mode, e),
        })?;

        trace!(path = %path.display(), kind = %kind, "opened file handle");

        Ok(Self {
            path,
            kind,
            file: Some(file),
        })
    }

    pub(crate) fn kind(&self) -> HandleKind {
        self.kind
    }

    pub(crate) fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Current size of the backing file in bytes.
    pub(crate) async fn file_size(&self) -> FileResult<u64> {
        let Some(file) = self.file.as_ref() else {
            return Err(self.closed_error());
        };
        let meta = file
            .metadata()
            .await
            .map_err(|e| FileError::io(self.path.clone(), self.kind.mode, e))?;
        Ok(meta.len())
    }

    /// Read the whole file from the beginning, bounded by `max_bytes`.
    ///
    /// The position is rewound first, so repeated whole-file reads
    /// through a cached handle observe the same bytes. Files larger
    /// than the bound fail instead of ballooning memory.
    pub(crate) async fn read_all(&mut self, max_bytes: u64) -> FileResult<Vec<u8>> {
        let (path, mode) = (self.path.clone(), self.kind.mode);
        let Some(file) = self.file.as_mut() else {
            return Err(closed_error_for(path, mode));
        };

        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| FileError::io(path.clone(), mode, e))?;

        let mut buf = Vec::new();
        let mut bounded = (&mut *file).take(max_bytes.saturating_add(1));
        bounded
            .read_to_end(&mut buf)
            .await
            .map_err(|e| FileError::io(path.clone(), mode, e))?;

        if buf.len() as u64 > max_bytes {
            return Err(FileError::io(
                path,
                mode,
                std::io::Error::other(format!(
                    "file exceeds the {max_bytes}-byte whole-file read bound"
                )),
            ));
        }

        Ok(buf)
    }

    /// Read up to `count` bytes from the current position.
    ///
    /// Reaching end-of-data yields an empty payload, not an error.
    pub(crate) async fn read_some(&mut self, count: usize) -> FileResult<Vec<u8>> {
        let (path, mode) = (self.path.clone(), self.kind.mode);
        let Some(file) = self.file.as_mut() else {
            return Err(closed_error_for(path, mode));
        };

        let mut buf = Vec::new();
        let mut bounded = (&mut *file).take(count as u64);
        bounded
            .read_to_end(&mut buf)
            .await
            .map_err(|e| FileError::io(path, mode, e))?;

        Ok(buf)
    }

    /// Write `bytes` at the handle's current position and flush.
    ///
    /// Append handles are positioned past end-of-data by their open
    /// flags, so the payload lands at the end regardless of seek state.
    /// Returns the number of bytes written.
    pub(crate) async fn write_all(&mut self, bytes: &[u8]) -> FileResult<usize> {
        let (path, mode) = (self.path.clone(), self.kind.mode);
        let Some(file) = self.file.as_mut() else {
            return Err(closed_error_for(path, mode));
        };

        file.write_all(bytes)
            .await
            .map_err(|e| FileError::io(path.clone(), mode, e))?;
        file.flush()
            .await
            .map_err(|e| FileError::io(path.clone(), mode, e))?;

        trace!(path = %path.display(), len = bytes.len(), "wrote payload");

        Ok(bytes.len())
    }

    /// Release the descriptor.
    ///
    /// Idempotent: closing an already-closed handle is a no-op. The
    /// descriptor is released exactly once, when the inner file is
    /// taken out and dropped.
    pub(crate) fn close(&mut self) {
        if let Some(file) = self.file.take() {
            debug!(path = %self.path.display(), kind = %self.kind, "closing file handle");
            drop(file);
        }
    }

    fn closed_error(&self) -> FileError {
        closed_error_for(self.path.clone(), self.kind.mode)
    }
}

fn closed_error_for(path: PathBuf, mode: AccessMode) -> FileError {
    FileError::io(path, mode, std::io::Error::other("file handle is closed"))
}
