//! Content-derived service versions
//!
//! A service version tags built images and keys build caches, so it must be
//! deterministic for identical inputs. Two schemes, tried in order:
//!
//! 1. When the service root sits in a clean git working tree, the short
//!    hash of the last commit touching the root, as `<hash>.git`. Stable
//!    across checkouts of the same commit, which is what makes commit-keyed
//!    build caching work.
//! 2. Otherwise (no VCS, dirty tree, no commit touching the path, or an
//!    unusable repository) a SHA-256 over the service's recorded file set,
//!    as `<digest>.sha`.
//!
//! The content hash covers the file count, each relative path, and each
//! file's raw bytes, in the service's recorded walk order. A listed file
//! that is already gone from disk is skipped (its path still contributes);
//! any other read failure is fatal.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::git::{find_git_root, GitAdapter};

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("failed to read {} while hashing: {source}", .path.display())]
    ReadFile { path: PathBuf, source: io::Error },
}

/// Computes the version for a service rooted at `root` with the given
/// recorded file list.
pub fn compute(root: &Path, files: &[String], git: &GitAdapter) -> Result<String, VersionError> {
    if let Some(version) = git_version(root, git) {
        return Ok(version);
    }
    content_version(root, files)
}

/// Commit-derived version, when the enclosing working tree is clean and a
/// commit touches `root`. Probe failures fall through to the content hash.
fn git_version(root: &Path, git: &GitAdapter) -> Option<String> {
    find_git_root(root)?;
    match git.has_local_modifications(root) {
        Ok(false) => {}
        Ok(true) => {
            debug!(root = %root.display(), "working tree dirty, using content hash");
            return None;
        }
        Err(e) => {
            debug!(root = %root.display(), error = %e, "git probe failed, using content hash");
            return None;
        }
    }
    let hash = git.last_commit_touching(root)?;
    Some(format!("{}.git", hash))
}

/// SHA-256 over the recorded file set. Position-sensitive: files are hashed
/// in recorded order, which the discovery walk keeps deterministic.
pub fn content_version(root: &Path, files: &[String]) -> Result<String, VersionError> {
    let mut hasher = Sha256::new();
    hasher.update(format!("files {}\0", files.len()).as_bytes());
    for name in files {
        hasher.update(format!("file {}\0", name).as_bytes());
        let path = root.join(name);
        match fs::read(&path) {
            Ok(bytes) => hasher.update(&bytes),
            // Listed but already deleted: the path marker alone counts.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(VersionError::ReadFile { path, source }),
        }
    }
    Ok(format!("{}.sha", hex::encode(hasher.finalize())))
}
