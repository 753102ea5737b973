//! Configuration for the file manager.

use serde::{Deserialize, Serialize};

/// One KiB, in bytes.
pub const KIB: u64 = 1_024;
/// One MiB, in bytes.
pub const MIB: u64 = 1_048_576;
/// One GiB, in bytes.
pub const GIB: u64 = 1_073_741_824;

/// Default maximum number of simultaneously open handles.
pub const DEFAULT_CAPACITY: usize = 64;

/// Default whole-file read bound: 50 MiB.
pub const DEFAULT_MAX_READ_BYTES: u64 = 52_428_800;

/// Behaviour of an acquire when the cache is full and every entry is
/// pinned by an in-flight operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Reject immediately with a capacity error.
    #[default]
    FailFast,
    /// Park the request until an in-flight operation releases its
    /// handle, then retry.
    Queue,
}

/// Configuration for [`FileManager`](crate::FileManager).
///
/// Every field has a production-ready default, so an empty config
/// section deserializes into a working manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileManagerConfig {
    /// Maximum number of simultaneously open handles. Values below 1
    /// are treated as 1.
    pub capacity: usize,
    /// What an acquire does when the cache is full and all entries are
    /// pinned. Applied uniformly to every operation.
    pub on_exhaustion: ExhaustionPolicy,
    /// Upper bound for whole-file reads, in bytes. Reads of larger
    /// files fail rather than ballooning memory.
    pub max_read_bytes: u64,
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            on_exhaustion: ExhaustionPolicy::default(),
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_yields_working_defaults() {
        let config: FileManagerConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileManagerConfig::default());
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.on_exhaustion, ExhaustionPolicy::FailFast);
        assert_eq!(config.max_read_bytes, DEFAULT_MAX_READ_BYTES);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config: FileManagerConfig = toml::from_str(
            "capacity = 4\non_exhaustion = \"queue\"\nmax_read_bytes = 1048576\n",
        )
        .unwrap();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.on_exhaustion, ExhaustionPolicy::Queue);
        assert_eq!(config.max_read_bytes, MIB);
    }
}
