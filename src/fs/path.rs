//! Path splitting
//!
//! Paths are `/`-separated; empty components are ignored, so `a/b`, `/a/b`
//! and `//a/b/` all name the same node. The empty path and `/` name the root.

use crate::constants::PATH_SEPARATOR;
use crate::error::{FsError, FsResult};

/// Non-empty components of `path`, root first
pub fn components(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR)
        .filter(|component| !component.is_empty())
        .collect()
}

/// Split `path` into its parent components and its final name
///
/// The root has no parent and is rejected.
pub fn split_parent(path: &str) -> FsResult<(Vec<&str>, &str)> {
    let mut parts = components(path);
    match parts.pop() {
        Some(name) => Ok((parts, name)),
        None => Err(FsError::InvalidPath(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_ignore_empty() {
        assert_eq!(components("/a/b"), vec!["a", "b"]);
        assert_eq!(components("a/b"), vec!["a", "b"]);
        assert_eq!(components("//a///b/"), vec!["a", "b"]);
        assert!(components("/").is_empty());
        assert!(components("").is_empty());
    }

    #[test]
    fn test_split_parent() {
        let (parent, name) = split_parent("/a/b/c").unwrap();
        assert_eq!(parent, vec!["a", "b"]);
        assert_eq!(name, "c");

        let (parent, name) = split_parent("top").unwrap();
        assert!(parent.is_empty());
        assert_eq!(name, "top");
    }

    #[test]
    fn test_split_root_fails() {
        assert!(matches!(split_parent("/"), Err(FsError::InvalidPath(_))));
        assert!(matches!(split_parent(""), Err(FsError::InvalidPath(_))));
    }
}
