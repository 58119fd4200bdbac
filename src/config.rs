use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
pub const DEFAULT_MAX_DIRECTORY_ITEMS: usize = 1000;
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 100;
pub const DEFAULT_DOWNLOAD_DIR: &str = "AppData/file";

/// Caps enforced by the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_directory_items: usize,
    pub max_search_results: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_directory_items: DEFAULT_MAX_DIRECTORY_ITEMS,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
        }
    }
}

impl Limits {
    /// Zero means "not configured" and falls back to the default.
    pub fn new(max_file_size: u64, max_directory_items: usize, max_search_results: usize) -> Self {
        let defaults = Self::default();
        Self {
            max_file_size: nonzero_or(max_file_size, defaults.max_file_size),
            max_directory_items: nonzero_or(max_directory_items, defaults.max_directory_items),
            max_search_results: nonzero_or(max_search_results, defaults.max_search_results),
        }
    }
}

fn nonzero_or<T: PartialEq + Default>(value: T, fallback: T) -> T {
    if value == T::default() { fallback } else { value }
}

/// Process-lifetime configuration. Built once in `main` and handed to the
/// gateway; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub allowed_dirs: Vec<PathBuf>,
    pub limits: Limits,
    pub debug: bool,
    pub recursive: bool,
    pub show_hidden: bool,
    pub download_dir: PathBuf,
    /// When set, deletions are moved here instead of the platform trash.
    pub trash_dir: Option<PathBuf>,
    pub connect_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            allowed_dirs: Vec::new(),
            limits: Limits::default(),
            debug: false,
            recursive: true,
            show_hidden: false,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            trash_dir: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    pub fn with_allowed(dirs: Vec<PathBuf>) -> Self {
        Self {
            allowed_dirs: dirs,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limits_fall_back_to_defaults() {
        let limits = Limits::new(0, 5, 0);
        assert_eq!(limits.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(limits.max_directory_items, 5);
        assert_eq!(limits.max_search_results, DEFAULT_MAX_SEARCH_RESULTS);
    }

    #[test]
    fn default_config_is_permissive_and_recursive() {
        let cfg = GatewayConfig::default();
        assert!(cfg.allowed_dirs.is_empty());
        assert!(cfg.recursive);
        assert!(!cfg.show_hidden);
    }
}
