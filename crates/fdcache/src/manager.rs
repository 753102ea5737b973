//! The public entry point: path-oriented operations resolved through
//! the handle cache.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fdcache_core::{
    AccessMode, Completion, Encoding, FileError, FileResult, HandleKind, PathKey,
};
use tracing::debug;

use crate::cache::HandleCache;
use crate::config::FileManagerConfig;

/// Managed access to files through a bounded cache of open handles.
///
/// Operations are async and may be issued concurrently: requests for
/// the same path serialize in arrival order on that path's cached
/// handle, requests for distinct paths proceed in parallel up to the
/// configured capacity. At most one handle is open per path
/// system-wide.
///
/// The manager owns the cache and the cache owns the handles; no other
/// component ever opens or closes one. Dropping the manager releases
/// every descriptor; [`close_all`](Self::close_all) drains in-flight
/// operations first.
#[derive(Debug)]
pub struct FileManager {
    cache: HandleCache,
    max_read_bytes: u64,
}

impl FileManager {
    /// Create a manager with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FileManagerConfig::default())
    }

    /// Create a manager from `config`.
    #[must_use]
    pub fn with_config(config: FileManagerConfig) -> Self {
        debug!(
            capacity = config.capacity,
            policy = ?config.on_exhaustion,
            "file manager created"
        );
        Self {
            cache: HandleCache::new(config.capacity, config.on_exhaustion),
            max_read_bytes: config.max_read_bytes,
        }
    }

    /// Number of handles currently held open by the cache.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.cache.len()
    }

    /// Read the whole file at `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// [`FileError::FileDoesNotExist`] for a missing path,
    /// [`FileError::NotAFile`] for a directory,
    /// [`FileError::CapacityExceeded`] under fail-fast exhaustion, and
    /// [`FileError::Io`] for OS-level failures, oversized files, or
    /// content that is not valid UTF-8.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> FileResult<String> {
        let key = PathKey::new(&path);
        let bytes = self.read_bytes(&key, Encoding::Text).await?;
        String::from_utf8(bytes).map_err(|e| {
            FileError::io(
                key.as_path(),
                AccessMode::Read,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Read the whole file at `path` as raw bytes.
    ///
    /// # Errors
    ///
    /// As [`read_file`](Self::read_file), minus UTF-8 validation.
    pub async fn read_binary_file(&self, path: impl AsRef<Path>) -> FileResult<Vec<u8>> {
        let key = PathKey::new(&path);
        self.read_bytes(&key, Encoding::Binary).await
    }

    /// Replace the file at `path` with `contents`.
    ///
    /// The file is created if missing and truncated when the handle is
    /// (re)opened; consecutive writes through the cached handle
    /// continue at its current position.
    ///
    /// # Errors
    ///
    /// [`FileError::NotAFile`], [`FileError::CapacityExceeded`], or
    /// [`FileError::Io`].
    pub async fn write_file(&self, path: impl AsRef<Path>, contents: &str) -> FileResult<()> {
        self.write_bytes(&path, contents.as_bytes(), AccessMode::Write, Encoding::Text)
            .await
    }

    /// Append `contents` past the current end of the file at `path`.
    ///
    /// # Errors
    ///
    /// As [`write_file`](Self::write_file).
    pub async fn append_file(&self, path: impl AsRef<Path>, contents: &str) -> FileResult<()> {
        self.write_bytes(&path, contents.as_bytes(), AccessMode::Append, Encoding::Text)
            .await
    }

    /// Replace the file at `path` with the raw `contents`.
    ///
    /// # Errors
    ///
    /// As [`write_file`](Self::write_file).
    pub async fn write_binary_file(
        &self,
        path: impl AsRef<Path>,
        contents: &[u8],
    ) -> FileResult<()> {
        self.write_bytes(&path, contents, AccessMode::Write, Encoding::Binary)
            .await
    }

    /// Append the raw `contents` past the current end of the file at
    /// `path`.
    ///
    /// # Errors
    ///
    /// As [`write_file`](Self::write_file).
    pub async fn append_binary_file(
        &self,
        path: impl AsRef<Path>,
        contents: &[u8],
    ) -> FileResult<()> {
        self.write_bytes(&path, contents, AccessMode::Append, Encoding::Binary)
            .await
    }

    /// Current size in bytes of the file at `path`.
    ///
    /// Resolved through the path's cached handle, so the size reflects
    /// every write already applied through the manager.
    ///
    /// # Errors
    ///
    /// [`FileError::FileDoesNotExist`], [`FileError::NotAFile`],
    /// [`FileError::CapacityExceeded`], or [`FileError::Io`].
    pub async fn file_size(&self, path: impl AsRef<Path>) -> FileResult<u64> {
        let key = PathKey::new(&path);
        let kind = HandleKind::new(AccessMode::Read, Encoding::Binary);
        let mut lease = self.cache.acquire(&key, kind).await?;
        lease.handle_mut().file_size().await
    }

    /// Drain and close every cached handle.
    ///
    /// Waits for each in-flight operation to finish before its handle
    /// is closed; no descriptor is released under active I/O. The
    /// manager remains usable afterwards — the next operation simply
    /// reopens. Dropping the manager instead releases descriptors
    /// without draining.
    pub async fn close_all(&self) {
        self.cache.close_all().await;
    }

    // ── Completion-bridged dispatch ──────────────────────────────

    /// Dispatch [`read_file`](Self::read_file) onto the runtime,
    /// delivering the result through `completion`.
    pub fn read_file_with<C>(self: &Arc<Self>, path: impl Into<PathBuf>, completion: C)
    where
        C: Completion<String> + 'static,
    {
        let path = path.into();
        self.dispatch(completion, move |manager| async move {
            manager.read_file(&path).await
        });
    }

    /// Dispatch [`read_binary_file`](Self::read_binary_file) onto the
    /// runtime, delivering the result through `completion`.
    pub fn read_binary_file_with<C>(self: &Arc<Self>, path: impl Into<PathBuf>, completion: C)
    where
        C: Completion<Vec<u8>> + 'static,
    {
        let path = path.into();
        self.dispatch(completion, move |manager| async move {
            manager.read_binary_file(&path).await
        });
    }

    /// Dispatch [`write_file`](Self::write_file) onto the runtime,
    /// delivering the success marker through `completion`.
    pub fn write_file_with<C>(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        completion: C,
    ) where
        C: Completion<()> + 'static,
    {
        let (path, contents) = (path.into(), contents.into());
        self.dispatch(completion, move |manager| async move {
            manager.write_file(&path, &contents).await
        });
    }

    /// Dispatch [`append_file`](Self::append_file) onto the runtime,
    /// delivering the success marker through `completion`.
    pub fn append_file_with<C>(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        completion: C,
    ) where
        C: Completion<()> + 'static,
    {
        let (path, contents) = (path.into(), contents.into());
        self.dispatch(completion, move |manager| async move {
            manager.append_file(&path, &contents).await
        });
    }

    /// Dispatch [`write_binary_file`](Self::write_binary_file) onto the
    /// runtime, delivering the success marker through `completion`.
    pub fn write_binary_file_with<C>(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
        completion: C,
    ) where
        C: Completion<()> + 'static,
    {
        let (path, contents) = (path.into(), contents.into());
        self.dispatch(completion, move |manager| async move {
            manager.write_binary_file(&path, &contents).await
        });
    }

    /// Dispatch [`append_binary_file`](Self::append_binary_file) onto
    /// the runtime, delivering the success marker through `completion`.
    pub fn append_binary_file_with<C>(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
        completion: C,
    ) where
        C: Completion<()> + 'static,
    {
        let (path, contents) = (path.into(), contents.into());
        self.dispatch(completion, move |manager| async move {
            manager.append_binary_file(&path, &contents).await
        });
    }

    /// Run `op` on the runtime and call `completion` exactly once with
    /// its outcome. Cancellation by the host (a dropped receiver, say)
    /// suppresses delivery but never aborts the started I/O.
    fn dispatch<T, C, F, Fut>(self: &Arc<Self>, completion: C, op: F)
    where
        T: Send + 'static,
        C: Completion<T> + 'static,
        F: FnOnce(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = FileResult<T>> + Send + 'static,
    {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            match op(manager).await {
                Ok(value) => completion.resolve(value),
                Err(error) => completion.reject(error),
            }
        });
    }

    async fn read_bytes(&self, key: &PathKey, encoding: Encoding) -> FileResult<Vec<u8>> {
        let kind = HandleKind::new(AccessMode::Read, encoding);
        let mut lease = self.cache.acquire(key, kind).await?;
        lease.handle_mut().read_all(self.max_read_bytes).await
    }

    async fn write_bytes(
        &self,
        path: impl AsRef<Path>,
        bytes: &[u8],
        mode: AccessMode,
        encoding: Encoding,
    ) -> FileResult<()> {
        let key = PathKey::new(&path);
        let kind = HandleKind::new(mode, encoding);
        let mut lease = self.cache.acquire(&key, kind).await?;
        lease.handle_mut().write_all(bytes).await?;
        Ok(())
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}
