//! Boundary types for the fdcache file manager.
//!
//! This crate holds everything that crosses the seam between the file
//! manager and its host runtime:
//! - The closed [`FileError`] taxonomy and the [`FileResult`] alias
//! - [`PathKey`], the canonicalized cache-key identity of a path
//! - The [`AccessMode`]/[`Encoding`] axes and their product, [`HandleKind`]
//! - The [`Completion`] capability through which results are delivered

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Result-delivery capability consumed once per operation.
pub mod completion;
/// The closed error taxonomy for file operations.
pub mod error;
/// Access-mode and encoding axes for typed handles.
pub mod mode;
/// Path canonicalization and cache-key identity.
pub mod path;

pub mod prelude;

pub use completion::Completion;
pub use error::{FileError, FileResult};
pub use mode::{AccessMode, Encoding, HandleKind};
pub use path::PathKey;
