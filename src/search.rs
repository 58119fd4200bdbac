use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use tokio::fs;
use tracing::debug;

use crate::request::FileTypeFilter;

/// Resolved search knobs (request options merged with configuration defaults).
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub case_sensitive: bool,
    pub include_hidden: bool,
    pub file_type: FileTypeFilter,
    pub recursive: bool,
    pub max_results: usize,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub path: PathBuf,
    pub relative: PathBuf,
    pub is_dir: bool,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub truncated: bool,
}

/// Walk `root` and collect entries whose root-relative path matches
/// `**/<pattern>`. Symlinked directories are reported but never descended.
/// Subdirectories that cannot be listed are skipped; only the root must be readable.
pub async fn search_paths(
    root: &Path,
    pattern: &str,
    params: SearchParams,
) -> Result<SearchOutcome> {
    let matcher = build_glob(pattern, params.case_sensitive)?;

    let mut stack = vec![root.to_path_buf()];
    let mut hits = Vec::new();
    let mut truncated = false;

    'walk: while let Some(current) = stack.pop() {
        let entries = match read_sorted(&current).await {
            Ok(entries) => entries,
            Err(err) if current == root => {
                return Err(err)
                    .with_context(|| format!("Failed to read directory {}", current.display()));
            }
            Err(err) => {
                debug!(path = %current.display(), "skipping unreadable directory: {err}");
                continue;
            }
        };

        let mut subdirs = Vec::new();
        for entry in entries {
            let name = entry.file_name();
            if !params.include_hidden && name.to_string_lossy().starts_with('.') {
                continue;
            }
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(err) => {
                    debug!(path = %entry.path().display(), "skipping unreadable entry: {err}");
                    continue;
                }
            };
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let is_dir = if file_type.is_symlink() {
                fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false)
            } else {
                file_type.is_dir()
            };

            if type_matches(params.file_type, is_dir) && matcher.is_match(&relative) {
                if hits.len() >= params.max_results {
                    truncated = true;
                    break 'walk;
                }
                hits.push(SearchHit {
                    path: path.clone(),
                    relative,
                    is_dir,
                });
            }

            if params.recursive && file_type.is_dir() {
                subdirs.push(path);
            }
        }
        // Reverse so the stack pops subdirectories in name order.
        stack.extend(subdirs.into_iter().rev());
    }

    Ok(SearchOutcome { hits, truncated })
}

async fn read_sorted(dir: &Path) -> std::io::Result<Vec<fs::DirEntry>> {
    let mut rd = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        entries.push(entry);
    }
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn type_matches(filter: FileTypeFilter, is_dir: bool) -> bool {
    match filter {
        FileTypeFilter::All => true,
        FileTypeFilter::File => !is_dir,
        FileTypeFilter::Directory => is_dir,
    }
}

fn build_glob(pattern: &str, case_sensitive: bool) -> Result<GlobMatcher> {
    let anchored = format!("**/{}", pattern.trim_start_matches("./"));
    let glob = GlobBuilder::new(&anchored)
        .case_insensitive(!case_sensitive)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid glob pattern '{pattern}'"))?;
    Ok(glob.compile_matcher())
}
