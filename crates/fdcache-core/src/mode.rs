//! Access-mode and encoding axes for typed file handles.
//!
//! The handle hierarchy is flat: a concrete handle variant is the
//! product of an [`AccessMode`] and an [`Encoding`]. Append and binary
//! compose as independent axes, so all six combinations (read, write,
//! append × text, binary) are expressible without a class lattice.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a handle may touch its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Read-only access; the file must already exist.
    Read,
    /// Write access; the file is created if missing and truncated at
    /// open, then writes land at the handle's current position.
    Write,
    /// Write access positioned past end-of-data on every write,
    /// regardless of seek state; the file is created if missing.
    Append,
}

impl AccessMode {
    /// True for the modes that mutate the file.
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::Append)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Append => write!(f, "append"),
        }
    }
}

/// How payloads are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Payloads are UTF-8 text.
    Text,
    /// Payloads are opaque bytes.
    Binary,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// The tag identifying a concrete handle variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleKind {
    /// Access axis.
    pub mode: AccessMode,
    /// Payload axis.
    pub encoding: Encoding,
}

impl HandleKind {
    /// Combine the two axes into a handle tag.
    #[must_use]
    pub const fn new(mode: AccessMode, encoding: Encoding) -> Self {
        Self { mode, encoding }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mode, self.encoding)
    }
}
