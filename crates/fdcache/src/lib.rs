//! Async file manager backed by a bounded cache of open file handles.
//!
//! Callers request whole-file reads, writes, and appends by path. Each
//! request resolves through [`FileManager`] to a [`PathKey`], acquires
//! the matching typed handle from the cache (reusing a live handle on a
//! hit, opening one on a miss), performs its I/O, and releases the
//! handle for the next request. The cache bounds how many handles are
//! open at once, evicts by recency, and never evicts an entry with an
//! operation in flight.
//!
//! Guarantees:
//! - at most one handle is open per path system-wide;
//! - same-path operations run one after another, in request order;
//! - distinct paths proceed in parallel up to the configured capacity;
//! - every failure is one of the typed [`FileError`] variants, carrying
//!   the path and requested mode.
//!
//! Results are ordinary `await`able futures, or — for hosts with their
//! own promise machinery — completions delivered through the
//! [`Completion`] capability via the `*_with` operations.
//!
//! ```no_run
//! use fdcache::{FileManager, FileManagerConfig};
//!
//! # async fn demo() -> fdcache::FileResult<()> {
//! let manager = FileManager::with_config(FileManagerConfig {
//!     capacity: 16,
//!     ..FileManagerConfig::default()
//! });
//!
//! manager.write_file("notes/today.txt", "fish the lake\n").await?;
//! manager.append_file("notes/today.txt", "mend the nets\n").await?;
//! let notes = manager.read_file("notes/today.txt").await?;
//! assert!(notes.ends_with("nets\n"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cache;
mod handle;

/// Manager configuration surface.
pub mod config;
/// The public file manager.
pub mod manager;

pub use config::{
    DEFAULT_CAPACITY, DEFAULT_MAX_READ_BYTES, ExhaustionPolicy, FileManagerConfig, GIB, KIB, MIB,
};
pub use manager::FileManager;

pub use fdcache_core::{
    AccessMode, Completion, Encoding, FileError, FileResult, HandleKind, PathKey,
};
