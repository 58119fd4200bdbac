use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::path::normalize_path;

/// One allow-listed root: the absolute path as configured, plus its
/// symlink-resolved form used for containment checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedDir {
    pub configured: PathBuf,
    pub canonical: PathBuf,
}

/// Immutable, cheaply cloneable allow-list. Empty means permissive mode.
#[derive(Debug, Clone, Default)]
pub struct AllowedDirs {
    inner: Arc<[AllowedDir]>,
}

impl AllowedDirs {
    pub fn new(initial: Vec<PathBuf>) -> Self {
        let mut dirs: Vec<AllowedDir> = Vec::with_capacity(initial.len());
        for dir in initial.into_iter().map(normalize_dir) {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        Self { inner: dirs.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllowedDir> {
        self.inner.iter()
    }

    /// True when `canonical_target` lies at or below one of the roots.
    /// Comparison is component-wise, so `/allowed-evil` is not under `/allowed`.
    pub fn contains(&self, canonical_target: &Path) -> bool {
        self.inner
            .iter()
            .any(|dir| canonical_target.starts_with(&dir.canonical))
    }
}

fn normalize_dir(dir: PathBuf) -> AllowedDir {
    let absolute = if dir.is_absolute() {
        dir
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&dir)
    };
    let configured = normalize_path(&absolute);
    let canonical = canonicalize_lossy(&configured).unwrap_or_else(|| configured.clone());
    AllowedDir {
        configured,
        canonical,
    }
}

fn canonicalize_lossy(path: &Path) -> Option<PathBuf> {
    std::fs::canonicalize(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_list_is_empty() {
        assert!(AllowedDirs::new(Vec::new()).is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let dir = tempdir().unwrap();
        let allowed = AllowedDirs::new(vec![dir.path().into(), dir.path().join(".")]);
        assert_eq!(allowed.iter().count(), 1);
    }

    #[test]
    fn prefix_spoofing_is_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("allowed");
        std::fs::create_dir(&root).unwrap();
        let allowed = AllowedDirs::new(vec![root.clone()]);
        let canonical_root = std::fs::canonicalize(&root).unwrap();

        assert!(allowed.contains(&canonical_root.join("a.txt")));
        assert!(allowed.contains(&canonical_root));
        let evil = canonical_root.with_file_name("allowed-evil").join("a.txt");
        assert!(!allowed.contains(&evil));
    }
}
