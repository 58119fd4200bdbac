use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Recoverable deletion. `DeleteFile` never unlinks directly.
pub trait Recycler: Send + Sync {
    fn recycle(&self, path: &Path) -> Result<()>;
}

/// The platform recycle bin (freedesktop trash, Windows Recycle Bin, macOS Trash).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl Recycler for SystemTrash {
    fn recycle(&self, path: &Path) -> Result<()> {
        trash::delete(path).with_context(|| format!("Failed to move '{}' to trash", path.display()))
    }
}

/// Moves items into a plain directory. Used where no desktop trash exists,
/// e.g. tests and headless containers.
#[derive(Debug, Clone)]
pub struct DirectoryTrash {
    root: PathBuf,
}

impl DirectoryTrash {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Recycler for DirectoryTrash {
    fn recycle(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create trash directory {}", self.root.display()))?;
        let name = path
            .file_name()
            .with_context(|| format!("Cannot trash '{}'", path.display()))?;
        let (target, _) = crate::unique::unique_path(&self.root.join(name));
        std::fs::rename(path, &target)
            .with_context(|| format!("Failed to move '{}' to trash", path.display()))
    }
}
