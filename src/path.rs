use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::allowed::AllowedDirs;
use crate::error::{GatewayError, GatewayResult};

/// The operation a path is being checked for. Only `ReadFile` and `FileInfo`
/// may reach outside the allow-list, and only with absolute paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ReadFile,
    FileInfo,
    WriteFile,
    AppendFile,
    EditFile,
    ListDirectory,
    CopyFile,
    MoveFile,
    RenameFile,
    DeleteFile,
    CreateDirectory,
    SearchFiles,
    DownloadFile,
}

impl OperationKind {
    pub fn is_read_only_bypass(self) -> bool {
        matches!(self, Self::ReadFile | Self::FileInfo)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Normalize path separators and collapse `.`/`..` where possible.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for comp in path.components() {
        match comp {
            Component::CurDir => continue,
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Make `raw` absolute against the current directory and lexically normalize it.
pub fn absolutize(raw: &str) -> PathBuf {
    let raw = PathBuf::from(raw);
    let absolute = if raw.is_absolute() {
        raw
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(raw)
    };
    normalize_path(&absolute)
}

const MAX_LINK_HOPS: u32 = 40;

/// Where `path` would really land once created. Dangling symlinks are
/// followed to their targets before the missing tail is re-attached.
pub fn real_path(path: &Path) -> PathBuf {
    resolve(path, 0)
}

fn resolve(path: &Path, hops: u32) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    let parent = path.parent();
    if hops < MAX_LINK_HOPS
        && let Ok(target) = std::fs::read_link(path)
    {
        let target = match parent {
            Some(parent) if target.is_relative() => resolve(parent, hops + 1).join(target),
            _ => target,
        };
        return resolve(&normalize_path(&target), hops + 1);
    }
    match (parent, path.file_name()) {
        (Some(parent), Some(name)) => resolve(parent, hops).join(name),
        _ => path.to_path_buf(),
    }
}

/// Decides whether a path may be touched by an operation.
#[derive(Debug, Clone, Default)]
pub struct PathGuard {
    allowed: AllowedDirs,
}

impl PathGuard {
    pub fn new(allowed: AllowedDirs) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &AllowedDirs {
        &self.allowed
    }

    pub fn is_allowed(&self, raw: &str, kind: OperationKind) -> bool {
        if self.allowed.is_empty() {
            debug!(path = raw, %kind, "no allowed directories configured; permissive");
            return true;
        }

        let target = real_path(&absolutize(raw));
        if self.allowed.contains(&target) {
            return true;
        }

        if kind.is_read_only_bypass() && Path::new(raw).is_absolute() {
            debug!(path = raw, %kind, "outside allowed directories; read-only bypass");
            return true;
        }

        debug!(path = raw, %kind, "access denied");
        false
    }

    /// Check a single path and return its absolute, normalized form.
    pub fn check(&self, raw: &str, kind: OperationKind) -> GatewayResult<PathBuf> {
        if self.is_allowed(raw, kind) {
            Ok(absolutize(raw))
        } else {
            Err(GatewayError::path_denied(raw))
        }
    }

    /// Check a source/destination pair; both must pass.
    pub fn check_pair(
        &self,
        source: &str,
        destination: &str,
        kind: OperationKind,
    ) -> GatewayResult<(PathBuf, PathBuf)> {
        if self.is_allowed(source, kind) && self.is_allowed(destination, kind) {
            Ok((absolutize(source), absolutize(destination)))
        } else {
            Err(GatewayError::pair_denied())
        }
    }
}
