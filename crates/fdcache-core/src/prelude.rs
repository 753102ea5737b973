//! Prelude module - commonly used types for convenient import.
//!
//! Use `use fdcache_core::prelude::*;` to import all boundary types.

// Errors
pub use crate::{FileError, FileResult};

// Handle tags
pub use crate::{AccessMode, Encoding, HandleKind};

// Cache keys
pub use crate::PathKey;

// Result delivery
pub use crate::Completion;
