//! Utility modules for forge
//!
//! Structured logging setup plus the small filesystem helpers shared by
//! discovery and resolution.

pub mod logging;

pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};

use std::path::{Path, PathBuf};

/// Walks upward from `start` looking for a directory that contains `marker`.
///
/// Returns the closest directory containing the marker, or `None` if the
/// filesystem root is reached without finding one.
pub fn search_parents(marker: &str, start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    while let Some(d) = dir {
        if d.join(marker).exists() {
            return Some(d);
        }
        dir = d.parent().map(Path::to_path_buf);
    }
    None
}

/// Like [`search_parents`] but returns the *outermost* directory containing
/// `marker` between the filesystem root and `start`.
pub fn search_parents_outermost(marker: &str, start: &Path) -> Option<PathBuf> {
    let mut found = None;
    let mut dir = Some(start.to_path_buf());
    while let Some(d) = dir {
        if d.join(marker).exists() {
            found = Some(d.clone());
        }
        dir = d.parent().map(Path::to_path_buf);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_search_parents_finds_closest() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("a/b/c")).unwrap();
        fs::write(base.join("marker"), "").unwrap();
        fs::write(base.join("a/marker"), "").unwrap();

        let found = search_parents("marker", &base.join("a/b/c")).unwrap();
        assert_eq!(found, base.join("a"));
    }

    #[test]
    fn test_search_parents_outermost_finds_topmost() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("a/b/c")).unwrap();
        fs::write(base.join("marker"), "").unwrap();
        fs::write(base.join("a/marker"), "").unwrap();

        let found = search_parents_outermost("marker", &base.join("a/b/c")).unwrap();
        assert_eq!(found, base.to_path_buf());
    }

    #[test]
    fn test_search_parents_missing() {
        let dir = TempDir::new().unwrap();
        assert!(search_parents("no-such-marker", dir.path()).is_none());
    }
}
