use std::path::{Path, PathBuf};

/// Find a free destination for `desired`, trying `name(1).ext`, `name(2).ext`, ...
///
/// Returns the chosen path and whether it differs from `desired`. The lookup is
/// check-then-use and not atomic against other processes.
pub fn unique_path(desired: &Path) -> (PathBuf, bool) {
    if !exists(desired) {
        return (desired.to_path_buf(), false);
    }

    let dir = desired.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = desired
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = desired
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter: u64 = 1;
    loop {
        let candidate = dir.join(format!("{stem}({counter}){ext}"));
        if !exists(&candidate) {
            return (candidate, true);
        }
        counter += 1;
    }
}

// Dangling symlinks count as taken.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_path_is_returned_unchanged() {
        let dir = tempdir().unwrap();
        let desired = dir.path().join("a.txt");
        assert_eq!(unique_path(&desired), (desired, false));
    }

    #[test]
    fn collision_gets_numbered_suffix_before_extension() {
        let dir = tempdir().unwrap();
        let desired = dir.path().join("a.txt");
        std::fs::write(&desired, "x").unwrap();

        let (first, renamed) = unique_path(&desired);
        assert!(renamed);
        assert_eq!(first, dir.path().join("a(1).txt"));
        assert!(!first.exists());

        // Probing again without creating anything is stable and still free.
        let (again, _) = unique_path(&desired);
        assert_eq!(again, first);
        assert!(!again.exists());

        std::fs::write(&first, "y").unwrap();
        assert_eq!(unique_path(&desired).0, dir.path().join("a(2).txt"));
    }

    #[test]
    fn multi_dot_and_extensionless_names() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("backup.tar.gz");
        let plain = dir.path().join("README");
        let dotfile = dir.path().join(".env");
        for p in [&archive, &plain, &dotfile] {
            std::fs::write(p, "").unwrap();
        }
        assert_eq!(unique_path(&archive).0, dir.path().join("backup.tar(1).gz"));
        assert_eq!(unique_path(&plain).0, dir.path().join("README(1)"));
        assert_eq!(unique_path(&dotfile).0, dir.path().join(".env(1)"));
    }

    #[test]
    fn directories_count_as_collisions() {
        let dir = tempdir().unwrap();
        let desired = dir.path().join("folder");
        std::fs::create_dir(&desired).unwrap();
        assert_eq!(unique_path(&desired), (dir.path().join("folder(1)"), true));
    }
}
