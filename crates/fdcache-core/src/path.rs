//! Path canonicalization and cache-key identity.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Canonicalized, hashable identity for a filesystem path.
///
/// Two syntactically different but semantically identical paths (extra
/// `.` segments, interior `..` hops, redundant separators) derive the
/// same key, so they hash and compare equal. Normalization is purely
/// lexical — the filesystem is never touched — which makes derivation
/// deterministic, side-effect free, and infallible.
///
/// A key is used only for cache lookup; it never owns the file it
/// names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(PathBuf);

impl PathKey {
    /// Derive the key for `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        let mut normalized = PathBuf::new();

        for component in path.as_ref().components() {
            match component {
                Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
                Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
                Component::CurDir => {},
                Component::ParentDir => {
                    let last_is_normal = matches!(
                        normalized.components().next_back(),
                        Some(Component::Normal(_))
                    );
                    let last_is_root = matches!(
                        normalized.components().next_back(),
                        Some(Component::RootDir | Component::Prefix(_))
                    );
                    if last_is_normal {
                        // A parent hop cancels the preceding segment.
                        normalized.pop();
                    } else if !last_is_root {
                        // Leading hops on a relative path are kept, so
                        // `../a` and `a` stay distinct identities; the
                        // parent of the root is the root itself.
                        normalized.push(Component::ParentDir.as_os_str());
                    }
                },
                Component::Normal(segment) => normalized.push(segment),
            }
        }

        if normalized.as_os_str().is_empty() {
            normalized.push(Component::CurDir.as_os_str());
        }

        Self(normalized)
    }

    /// The normalized path backing this key.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume the key, yielding its normalized path.
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_paths_derive_equal_keys() {
        assert_eq!(PathKey::new("/var/data/file.txt"), PathKey::new("/var/data/file.txt"));
        assert_eq!(PathKey::new("/var/./data/file.txt"), PathKey::new("/var/data/file.txt"));
        assert_eq!(PathKey::new("/var/tmp/../data/f"), PathKey::new("/var/data/f"));
        assert_eq!(PathKey::new("a/b/"), PathKey::new("a/b"));
    }

    #[test]
    fn derivation_is_idempotent() {
        let key = PathKey::new("x/./y/../z");
        assert_eq!(PathKey::new(key.as_path()), key);
    }

    #[test]
    fn distinct_paths_stay_distinct() {
        assert_ne!(PathKey::new("/var/a"), PathKey::new("/var/b"));
        assert_ne!(PathKey::new("a"), PathKey::new("../a"));
        assert_ne!(PathKey::new("a"), PathKey::new("/a"));
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(PathKey::new("/.."), PathKey::new("/"));
        assert_eq!(PathKey::new("/../etc"), PathKey::new("/etc"));
    }

    #[test]
    fn leading_parent_hops_are_kept() {
        assert_eq!(PathKey::new("../../a"), PathKey::new("../../a"));
        assert_eq!(PathKey::new("a/../../b"), PathKey::new("../b"));
    }

    #[test]
    fn fully_cancelled_path_is_current_dir() {
        assert_eq!(PathKey::new("a/.."), PathKey::new("."));
        assert_eq!(PathKey::new(""), PathKey::new("."));
    }
}
